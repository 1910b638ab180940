use approx::assert_relative_eq;
use extract::coupling::{find_coupling, CouplingTable};
use extract::node::ResolvedName;
use extract::region::find_regions;
use extract::tile::PlaneSet;
use extract::{
    extract_hierarchical, ArraySpec, CancellationToken, CellDef, CellId, Cause, ExtractOptions,
    ExtractionResult, Instance, LabelKind, Library, PlaneId, Record, TechStyle, TileTypeId,
};
use geometry::prelude::*;
use test_log::test;

fn metal_tech(area_cap: f64) -> (TechStyle, PlaneId, TileTypeId) {
    let mut tech = TechStyle::new();
    let pm1 = tech.add_plane("metal1", 1);
    let m1 = tech.add_type("m1", pm1, 0, area_cap, 0.0);
    (tech, pm1, m1)
}

/// A 10x10 leaf cell, optionally labeled over its whole tile.
fn leaf(lib: &mut Library, plane: PlaneId, ty: TileTypeId, label: Option<&str>) -> CellId {
    let mut cell = CellDef::new(
        label.map(|l| format!("leaf_{l}")).unwrap_or_else(|| "leaf".to_string()),
        1,
    );
    cell.planes.paint(plane, Rect::from_sides(0, 0, 10, 10), ty);
    if let Some(text) = label {
        cell.add_label(text, Rect::from_sides(0, 0, 10, 10), ty, LabelKind::NodeName);
    }
    lib.add_cell(cell)
}

fn run(lib: &Library, top: CellId, tech: &TechStyle) -> ExtractionResult {
    extract_hierarchical(lib, top, tech, ExtractOptions::default(), &CancellationToken::new())
}

fn merges(result: &ExtractionResult) -> Vec<&Record> {
    result
        .records
        .iter()
        .filter(|r| matches!(r, Record::Merge { .. }))
        .collect()
}

fn caps(result: &ExtractionResult) -> Vec<&Record> {
    result
        .records
        .iter()
        .filter(|r| matches!(r, Record::Cap { .. }))
        .collect()
}

/// Two abutting instances of a labeled cell merge into one node, with
/// the merge record carrying the perimeter correction for the shared
/// edge.
#[test]
fn abutting_instances_merge() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(10, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(result.issues.is_empty());
    assert_eq!(result.stats.interactions, 1);

    let merges = merges(&result);
    assert_eq!(merges.len(), 1);
    let Record::Merge {
        node1,
        node2,
        deltas: Some(d),
    } = merges[0]
    else {
        panic!("expected a merge record with deltas, got {:?}", merges[0]);
    };
    assert_eq!(node1, "u0/a");
    assert_eq!(node2, "u1/a");
    // The shared edge is counted by both subtree extractions but only
    // once (as zero) in the combined view.
    assert_eq!(d.pa[0].perim, -20);
    assert_eq!(d.pa[0].area, 0);
    assert_relative_eq!(d.cap, 0.0);
}

/// Connected paint that overlaps across subtrees is counted once in the
/// combined view, so the merge carries the negative overlap correction
/// rather than a zero delta.
#[test]
fn overlapping_instances_count_area_once() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(5, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(result.issues.is_empty());
    let merges = merges(&result);
    assert_eq!(merges.len(), 1);
    let Record::Merge {
        node1,
        node2,
        deltas: Some(d),
    } = merges[0]
    else {
        panic!("expected a merge record with deltas, got {:?}", merges[0]);
    };
    assert_eq!(node1, "u0/a");
    assert_eq!(node2, "u1/a");
    // The 5x10 strip covered by both instances is counted by each
    // subtree extraction but only once in the combined view.
    assert_eq!(d.pa[0].area, -50);
    assert_eq!(d.pa[0].perim, -25);
    assert_relative_eq!(d.cap, -50.0);
}

/// Running the same extraction twice yields identical records.
#[test]
fn extraction_is_deterministic() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(10, 0)));
    let top = lib.add_cell(top);

    let first = run(&lib, top, &tech);
    let second = run(&lib, top, &tech);
    assert_eq!(first.records, second.records);
    assert!(!first.records.is_empty());
}

/// A node spanning k subtrees produces k-1 merge records, with the
/// adjustments on the first record only.
#[test]
fn merge_chains_carry_deltas_once() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    for i in 0..3 {
        top.add_instance(Instance::new(
            format!("u{i}"),
            child,
            Transformation::translate(10 * i, 0),
        ));
    }
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    let merges = merges(&result);
    assert_eq!(merges.len(), 2);
    let Record::Merge {
        node1,
        node2,
        deltas: Some(d),
    } = merges[0]
    else {
        panic!("first merge should carry deltas: {:?}", merges[0]);
    };
    assert_eq!(node1, "u0/a");
    assert_eq!(node2, "u1/a");
    // Two shared edges, each double counted by the subtree extractions.
    assert_eq!(d.pa[0].perim, -40);
    assert!(matches!(
        merges[1],
        Record::Merge { node1, node2, deltas: None } if node1 == "u0/a" && node2 == "u2/a"
    ));
}

/// Sidewall coupling between subtrees is the combined-view value, since
/// neither subtree sees the other's edge on its own.
#[test]
fn cross_hierarchy_sidewall_coupling() {
    let mut tech = TechStyle::new();
    let plane = tech.add_plane("metal1", 1);
    let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);
    tech.add_sidewall(m1, m1, 3.0);
    tech.set_side_halo(10);

    let mut lib = Library::new();
    let mut child = CellDef::new("bar", 1);
    child.planes.paint(plane, Rect::from_sides(0, 0, 10, 20), m1);
    child.add_label("a", Rect::from_sides(0, 0, 10, 20), m1, LabelKind::NodeName);
    let child = lib.add_cell(child);

    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(14, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert_eq!(result.records.len(), 1);
    let Record::Cap {
        node1,
        node2,
        value,
    } = &result.records[0]
    else {
        panic!("expected a cap record, got {:?}", result.records[0]);
    };
    assert_eq!(node1, "u0/a");
    assert_eq!(node2, "u1/a");
    // Facing 20-unit edges at separation 4, both directions of the
    // symmetric rule: 2 * 3.0 * 20 / 4.
    assert_relative_eq!(*value, 30.0);
}

/// The emitted cap records equal coupling(combined) minus the sum of
/// coupling(subtree), with both sides of the difference recomputed
/// independently through the coupling analyzer.
#[test]
fn emitted_coupling_matches_buffer_difference() {
    let mut tech = TechStyle::new();
    let plane = tech.add_plane("metal1", 1);
    let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);
    tech.add_sidewall(m1, m1, 3.0);
    tech.set_side_halo(10);

    // Each child holds two parallel bars, so every subtree has internal
    // coupling of its own that must cancel out of the difference.
    let mut lib = Library::new();
    let mut child = CellDef::new("pair", 1);
    child.planes.paint(plane, Rect::from_sides(0, 0, 2, 20), m1);
    child.add_label("l", Rect::from_sides(0, 0, 2, 20), m1, LabelKind::NodeName);
    child.planes.paint(plane, Rect::from_sides(6, 0, 8, 20), m1);
    child.add_label("r", Rect::from_sides(6, 0, 8, 20), m1, LabelKind::NodeName);
    let child = lib.add_cell(child);
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(12, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);

    // Recompute both sides directly: the buffers hold each instance's
    // bars clipped to the interaction area, the combined set holds all
    // four.
    let clip = Rect::from_sides(1, 0, 19, 20);
    let bars = [
        ("u0/l", Rect::from_sides(1, 0, 2, 20)),
        ("u0/r", Rect::from_sides(6, 0, 8, 20)),
        ("u1/l", Rect::from_sides(12, 0, 14, 20)),
        ("u1/r", Rect::from_sides(18, 0, 19, 20)),
    ];
    let analyze = |group: &[(&str, Rect)]| {
        let mut planes = PlaneSet::new(1);
        for (_, r) in group {
            planes.paint(plane, *r, m1);
        }
        let mut regions = find_regions(&planes, &[], clip, &tech, &CancellationToken::new());
        assert_eq!(regions.regions.len(), group.len());
        for (region, (name, _)) in regions.regions.iter_mut().zip(group) {
            region.name = Some(ResolvedName {
                name: (*name).into(),
                generated: false,
            });
        }
        find_coupling(&planes, &regions, clip, &tech, 10).table
    };
    let mut diff = CouplingTable::new();
    diff.add_scaled(&analyze(&bars), 1.0);
    diff.add_scaled(&analyze(&bars[..2]), -1.0);
    diff.add_scaled(&analyze(&bars[2..]), -1.0);

    let caps = caps(&result);
    let nonzero = diff.iter().filter(|(_, v)| v.abs() > 1e-9).count();
    assert_eq!(nonzero, 3);
    assert_eq!(caps.len(), nonzero);
    for record in caps {
        let Record::Cap {
            node1,
            node2,
            value,
        } = record
        else {
            unreachable!();
        };
        assert_relative_eq!(*value, diff.get(node1, node2));
    }
}

/// The scale option divides emitted capacitances.
#[test]
fn scale_divides_capacitance() {
    let mut tech = TechStyle::new();
    let plane = tech.add_plane("metal1", 1);
    let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);
    tech.add_sidewall(m1, m1, 3.0);
    tech.set_side_halo(10);

    let mut lib = Library::new();
    let mut child = CellDef::new("bar", 1);
    child.planes.paint(plane, Rect::from_sides(0, 0, 10, 20), m1);
    child.add_label("a", Rect::from_sides(0, 0, 10, 20), m1, LabelKind::NodeName);
    let child = lib.add_cell(child);

    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(14, 0)));
    let top = lib.add_cell(top);

    let opts = ExtractOptions {
        scale: Some(2.0),
        ..ExtractOptions::default()
    };
    let result = extract_hierarchical(&lib, top, &tech, opts, &CancellationToken::new());
    assert!(matches!(
        &result.records[0],
        Record::Cap { value, .. } if (*value - 15.0).abs() < 1e-9
    ));
}

/// Coupling between pieces of the same node is suppressed, but the
/// substrate capacitance the overlapped area loses still appears as a
/// (negative) adjustment on the merged node.
#[test]
fn same_node_overlap_redirects_substrate_only() {
    let mut tech = TechStyle::new();
    let pm1 = tech.add_plane("metal1", 1);
    let pm2 = tech.add_plane("metal2", 2);
    let m1 = tech.add_type("m1", pm1, 0, 0.0, 0.0);
    let m2 = tech.add_type("m2", pm2, 1, 1.0, 0.0);
    tech.add_overlap(m2, m1, 0.5, vec![]);

    let mut lib = Library::new();
    let mut child = CellDef::new("leaf", 2);
    child.planes.paint(pm1, Rect::from_sides(0, 0, 10, 10), m1);
    child.add_label("x", Rect::from_sides(0, 0, 10, 10), m1, LabelKind::NodeName);
    let child = lib.add_cell(child);

    // The parent's own m1 abuts the child's (merging them), and the
    // parent routes m2 named the same as its m1 over the child.
    let mut top = CellDef::new("top", 2);
    top.planes.paint(pm1, Rect::from_sides(0, 0, 10, 10), m1);
    top.add_label("n", Rect::from_sides(0, 0, 10, 10), m1, LabelKind::NodeName);
    top.planes.paint(pm2, Rect::from_sides(12, 2, 18, 8), m2);
    top.add_label("n", Rect::from_sides(12, 2, 18, 8), m2, LabelKind::NodeName);
    top.add_instance(Instance::new("u0", child, Transformation::translate(10, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(!result.issues.has_error());
    assert!(caps(&result).is_empty());

    let merges = merges(&result);
    assert_eq!(merges.len(), 1);
    let Record::Merge {
        node1,
        node2,
        deltas: Some(d),
    } = merges[0]
    else {
        panic!("expected a merge with deltas, got {:?}", merges[0]);
    };
    assert_eq!(node1, "n");
    assert_eq!(node2, "u0/x");
    // 36 units of m2 over the same node's m1 no longer see substrate.
    assert_relative_eq!(d.cap, -36.0);
    assert_eq!(d.pa[0].perim, -20);
    assert_eq!(d.pa[1].perim, 0);
    assert_eq!(d.pa[1].area, 0);
}

/// Unlabeled geometry gets deterministic generated names (a warning,
/// not an error) and still merges correctly.
#[test]
fn unlabeled_nodes_get_generated_names() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, None);
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(10, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert_eq!(result.issues.num_errors(), 0);
    assert_eq!(result.issues.num_warnings(), 2);
    assert!(result
        .issues
        .iter()
        .all(|i| matches!(i.cause(), Cause::GeneratedName { .. })));

    let merges = merges(&result);
    assert_eq!(merges.len(), 1);
    let Record::Merge { node1, node2, .. } = merges[0] else {
        unreachable!();
    };
    assert!(node1.ends_with('#') && node1.starts_with("metal1_"));
    assert!(node2.ends_with('#'));
    assert!(caps(&result).is_empty());
}

/// Overlapping unconnected types from different subtrees are a fatal
/// extraction error, but processing continues.
#[test]
fn illegal_overlap_is_reported() {
    let mut tech = TechStyle::new();
    let plane = tech.add_plane("metal1", 1);
    let a = tech.add_type("ta", plane, 0, 0.0, 0.0);
    let b = tech.add_type("tb", plane, 0, 0.0, 0.0);

    let mut lib = Library::new();
    let leaf_a = leaf(&mut lib, plane, a, Some("a"));
    let leaf_b = leaf(&mut lib, plane, b, Some("b"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", leaf_a, Transformation::identity()));
    top.add_instance(Instance::new("u1", leaf_b, Transformation::translate(5, 0)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(result.issues.has_error());
    assert!(result
        .issues
        .iter()
        .any(|i| matches!(i.cause(), Cause::IllegalOverlap { .. })));
    // Unconnected overlap neither merges nor couples.
    assert!(result.records.is_empty());
}

/// A 1-dimensional array is analyzed once for the representative
/// adjacent pair, and the records carry ranged subscripts covering the
/// whole array.
#[test]
fn array_records_use_ranged_subscripts() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new_array(
        "row",
        child,
        Transformation::identity(),
        ArraySpec {
            xlo: 0,
            xhi: 4,
            ylo: 0,
            yhi: 0,
            xsep: 10,
            ysep: 0,
        },
    ));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert_eq!(result.stats.interactions, 1);

    let merges = merges(&result);
    assert_eq!(merges.len(), 1);
    let Record::Merge { node1, node2, .. } = merges[0] else {
        unreachable!();
    };
    assert_eq!(node1, "row[0:3]/a");
    assert_eq!(node2, "row[1:4]/a");
}

/// Array-element nodes must be nameable from real labels; unlabeled
/// array geometry gets the `(none)` placeholder and a fatal error.
#[test]
fn unlabeled_array_nodes_are_unresolvable() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, None);
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new_array(
        "row",
        child,
        Transformation::identity(),
        ArraySpec {
            xlo: 0,
            xhi: 1,
            ylo: 0,
            yhi: 0,
            xsep: 10,
            ysep: 0,
        },
    ));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(result.issues.has_error());
    assert_eq!(result.issues.num_errors(), 2);
    assert!(result
        .issues
        .iter()
        .all(|i| matches!(i.cause(), Cause::UnresolvableName { .. })));
    // Both elements resolve to the same placeholder, so nothing merges.
    assert!(merges(&result).is_empty());
}

/// Cancellation before the first chunk produces an empty, clearly
/// unfinished result.
#[test]
fn cancellation_is_clean() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(10, 0)));
    let top = lib.add_cell(top);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = extract_hierarchical(&lib, top, &tech, ExtractOptions::default(), &cancel);
    assert!(result.stats.cancelled);
    assert!(result.stats.unfinished > 0);
    assert!(result.records.is_empty());
}

/// Chunked extraction reproduces the flat answer: the union of merge
/// records over all chunks yields the same node partition as a
/// whole-design flood fill, and the per-chunk clipped deltas sum to the
/// flat perimeter correction with no double counting across chunk
/// boundaries.
#[test]
fn chunked_deltas_match_flat_extraction() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    for i in 0..4 {
        top.add_instance(Instance::new(
            format!("u{i}"),
            child,
            Transformation::translate(10 * i, 0),
        ));
    }
    let top = lib.add_cell(top);

    let opts = ExtractOptions {
        step_size: Some(10),
        ..ExtractOptions::default()
    };
    let result = extract_hierarchical(&lib, top, &tech, opts, &CancellationToken::new());
    assert!(result.issues.is_empty());
    assert!(result.stats.chunks > 1);

    // Union the merge records into partitions.
    let mut classes: Vec<Vec<String>> = Vec::new();
    for record in merges(&result) {
        let Record::Merge { node1, node2, .. } = record else {
            unreachable!();
        };
        let (a, b) = (node1.to_string(), node2.to_string());
        let ia = classes.iter().position(|c| c.contains(&a));
        let ib = classes.iter().position(|c| c.contains(&b));
        match (ia, ib) {
            (None, None) => classes.push(vec![a, b]),
            (Some(i), None) => classes[i].push(b),
            (None, Some(i)) => classes[i].push(a),
            (Some(i), Some(j)) if i != j => {
                let absorbed = classes.remove(i.max(j));
                classes[i.min(j)].extend(absorbed);
            }
            _ => {}
        }
    }
    assert_eq!(classes.len(), 1);
    for i in 0..4 {
        assert!(classes[0].contains(&format!("u{i}/a")));
    }

    // Flat: one node of perimeter 100; subtrees alone total 160.
    let perim_delta: i64 = result
        .records
        .iter()
        .filter_map(|r| match r {
            Record::Merge {
                deltas: Some(d), ..
            } => Some(d.pa[0].perim),
            _ => None,
        })
        .sum();
    assert_eq!(perim_delta, -60);
    let cap_delta: f64 = result
        .records
        .iter()
        .filter_map(|r| match r {
            Record::Merge {
                deltas: Some(d), ..
            } => Some(d.cap),
            _ => None,
        })
        .sum();
    assert_relative_eq!(cap_delta, 0.0);
}

/// A cell whose subtrees never come near each other produces no records.
#[test]
fn distant_instances_do_not_interact() {
    let (tech, plane, m1) = metal_tech(1.0);
    let mut lib = Library::new();
    let child = leaf(&mut lib, plane, m1, Some("a"));
    let mut top = CellDef::new("top", 1);
    top.add_instance(Instance::new("u0", child, Transformation::identity()));
    top.add_instance(Instance::new("u1", child, Transformation::translate(500, 500)));
    let top = lib.add_cell(top);

    let result = run(&lib, top, &tech);
    assert!(result.records.is_empty());
    assert!(result.issues.is_empty());
    assert_eq!(result.stats.interactions, 0);
}
