//! The region finder: flood-fills connected, same-node geometry within
//! one flattened buffer.
//!
//! The walk keeps an explicit worklist rather than recursing, so
//! arbitrarily large connected shapes cannot exhaust the stack, and it is
//! safely restartable: if cancelled, every tile still on the worklist is
//! assigned to the region it belonged to before returning, so no tile is
//! left in an ambiguous unvisited/pending state.

use std::collections::HashMap;

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::CancellationToken;
use crate::db::{Label, LabelKind};
use crate::node::{PerimArea, ResolvedName};
use crate::tech::{PlaneId, TechStyle, TileTypeId};
use crate::tile::{abuts_or_overlaps, clip_contains, PlaneSet, Tile, TileKey};

/// One flood-filled connected component inside a single flattened buffer.
///
/// Regions are ephemeral: they are discarded once their information has
/// been folded into nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    /// The lowest-numbered plane in the region.
    pub plane: PlaneId,
    /// The lowest-leftmost point of the region on that plane: minimum
    /// first in x, then in y. Used to synthesize a name when no label
    /// exists.
    pub ll: Point,
    /// The type of the tile anchoring `ll`.
    pub ty: TileTypeId,
    /// The rectangle of the anchor tile, used as the hard-way query area.
    pub anchor: Rect,
    /// Node-name labels attached to the region, in attachment order.
    pub labels: Vec<ArcStr>,
    /// Capacitance to substrate accumulated over the clip area.
    pub cap: f64,
    /// Perimeter/area accumulated per resistance class over the clip
    /// area.
    pub pa: Vec<PerimArea>,
    /// The node name resolved for this region, once known.
    pub name: Option<ResolvedName>,
}

/// The result of one region search over a buffer.
#[derive(Clone, Debug, Default)]
pub struct RegionSet {
    /// All regions found, in discovery order.
    pub regions: Vec<Region>,
    /// Maps every visited tile to the index of its region.
    pub assignment: HashMap<TileKey, usize>,
    /// The number of tiles visited; single-tile regions are recognizable
    /// by callers through this counter.
    pub visited: usize,
    /// Indices into the searched label list of node-name labels that
    /// attached to no geometry ("sticky" labels).
    pub unattached_labels: Vec<usize>,
    /// Whether the search was interrupted by cancellation.
    pub interrupted: bool,
}

impl RegionSet {
    /// The region index a tile was assigned to, if it was visited.
    pub fn region_of(&self, key: TileKey) -> Option<usize> {
        self.assignment.get(&key).copied()
    }

    /// The resolved name of the region containing a tile, if both the
    /// assignment and the resolution exist.
    pub fn name_of(&self, key: TileKey) -> Option<&ResolvedName> {
        self.region_of(key)
            .and_then(|i| self.regions[i].name.as_ref())
    }
}

/// Finds all connected regions in `planes`, charging perimeter and area
/// contributions only within `clip`.
///
/// Connectivity follows the technology style: same-plane abutment or
/// overlap between connected types, cross-plane reach through contacts,
/// and 1-unit-halo adjacency for types declared connected across planes
/// without a contact. Node-name labels in `labels` are attached to the
/// regions whose geometry of a connected type they touch.
pub fn find_regions(
    planes: &PlaneSet,
    labels: &[Label],
    clip: Rect,
    tech: &TechStyle,
    cancel: &CancellationToken,
) -> RegionSet {
    let mut set = RegionSet::default();
    let num_classes = tech.num_resist_classes();

    let seeds: Vec<TileKey> = planes.all_tiles().map(|(k, _)| k).collect();
    for seed in seeds {
        if set.assignment.contains_key(&seed) {
            continue;
        }
        let ridx = set.regions.len();
        let seed_tile = *planes.tile(seed);
        set.regions.push(Region {
            plane: seed.plane,
            ll: seed_tile.rect.lower_left(),
            ty: seed_tile.ty,
            anchor: seed_tile.rect,
            labels: Vec::new(),
            cap: 0.0,
            pa: vec![PerimArea::default(); num_classes],
            name: None,
        });

        let mut stack = vec![seed];
        while let Some(key) = stack.pop() {
            if cancel.is_cancelled() {
                // Restart guarantee: everything still pending belongs to
                // this region.
                set.assignment.entry(key).or_insert(ridx);
                for k in stack.drain(..) {
                    set.assignment.entry(k).or_insert(ridx);
                }
                set.interrupted = true;
                attach_labels(&mut set, planes, labels, tech);
                return set;
            }
            if set.assignment.contains_key(&key) {
                continue;
            }
            set.assignment.insert(key, ridx);
            set.visited += 1;

            let tile = *planes.tile(key);
            update_anchor(&mut set.regions[ridx], key.plane, &tile);
            fold_tile(&mut set.regions[ridx], key, &tile, planes, clip, tech);
            push_neighbors(&mut stack, &set.assignment, key, &tile, planes, tech);
        }
    }

    attach_labels(&mut set, planes, labels, tech);
    set
}

/// Keeps the region anchored at its lowest plane and lowest-leftmost
/// point (minimum first in x, then in y).
fn update_anchor(region: &mut Region, plane: PlaneId, tile: &Tile) {
    let ll = tile.rect.lower_left();
    let better = plane < region.plane
        || (plane == region.plane
            && (ll.x < region.ll.x || (ll.x == region.ll.x && ll.y < region.ll.y)));
    if better {
        region.plane = plane;
        region.ll = ll;
        region.ty = tile.ty;
        region.anchor = tile.rect;
    }
}

/// Folds one tile's clipped area, perimeter, and substrate capacitance
/// into its region.
fn fold_tile(
    region: &mut Region,
    key: TileKey,
    tile: &Tile,
    planes: &PlaneSet,
    clip: Rect,
    tech: &TechStyle,
) {
    let info = tech.type_info(tile.ty);
    let class = info.resist_class;

    if let Some(c) = tile.rect.intersection(clip) {
        let area = c.area();
        region.pa[class].area += area;
        region.cap += info.area_cap * area as f64;
    }

    for edge in tile.edges() {
        // The edge coordinate must lie within the clip along the edge's
        // perpendicular axis. Half-open: an edge on the clip's upper
        // boundary is charged by the adjacent chunk.
        let perp = clip.span(!edge.side.edge_dir());
        if !clip_contains(perp, edge.coord) {
            continue;
        }
        let Some(span) = edge.span.intersection(clip.span(edge.side.edge_dir())) else {
            continue;
        };
        if span.length() == 0 {
            continue;
        }

        // Subtract the portion of the edge faced by connected material.
        let beyond = crate::tile::EdgeSeg {
            span,
            ..edge
        }
        .band(1);
        let mut covered = 0;
        for (k2, t2) in planes.tiles_touching(key.plane, beyond) {
            if k2 == key || !tech.connected(tile.ty, t2.ty) {
                continue;
            }
            if let Some(r) = t2.rect.intersection(beyond) {
                if r.span(!edge.side.edge_dir()).length() > 0 {
                    covered += r.span(edge.side.edge_dir()).length();
                }
            }
        }
        let remaining = (span.length() - covered).max(0);
        region.pa[class].perim += remaining;
        region.cap += info.perim_cap * remaining as f64;
    }
}

/// Pushes every unvisited neighbor connected to `tile` onto the
/// worklist.
fn push_neighbors(
    stack: &mut Vec<TileKey>,
    assignment: &HashMap<TileKey, usize>,
    key: TileKey,
    tile: &Tile,
    planes: &PlaneSet,
    tech: &TechStyle,
) {
    // Planar neighbors: abutting or overlapping connected tiles.
    for (k2, t2) in planes.tiles_touching(key.plane, tile.rect) {
        if k2 == key || assignment.contains_key(&k2) {
            continue;
        }
        if tech.connected(tile.ty, t2.ty) && abuts_or_overlaps(tile.rect, t2.rect) {
            stack.push(k2);
        }
    }

    // Planes reachable because the tile is a contact.
    let info = tech.type_info(tile.ty);
    for &q in &info.contact_planes {
        for (k2, t2) in planes.tiles_overlapping(q, tile.rect) {
            if !assignment.contains_key(&k2) && tech.connected(tile.ty, t2.ty) {
                stack.push(k2);
            }
        }
    }

    // Types that connect across planes without a contact: search a
    // 1-unit halo of the tile's bounding box on every other plane.
    if tech.has_cross_plane(tile.ty) {
        let halo = tile.rect.expand_all(1);
        for q in tech.plane_ids() {
            if q == key.plane || info.contact_planes.contains(&q) {
                continue;
            }
            for (k2, t2) in planes.tiles_touching(q, halo) {
                if !assignment.contains_key(&k2) && tech.cross_plane_connected(tile.ty, t2.ty) {
                    stack.push(k2);
                }
            }
        }
    }
}

/// Attaches node-name labels to the regions whose geometry they touch;
/// labels touching no geometry are reported as sticky.
///
/// A label only attaches to tiles whose type connects to the label's
/// type, so a label hanging over an unrelated net never names it.
fn attach_labels(set: &mut RegionSet, planes: &PlaneSet, labels: &[Label], tech: &TechStyle) {
    for (i, label) in labels.iter().enumerate() {
        if label.kind != LabelKind::NodeName {
            continue;
        }
        let plane = tech.type_info(label.ty).plane;
        let region = planes
            .tiles_touching(plane, label.rect)
            .filter(|(_, t)| tech.connected(label.ty, t.ty))
            .find_map(|(k, _)| set.region_of(k));
        match region {
            Some(r) => set.regions[r].labels.push(label.text.clone()),
            None => set.unattached_labels.push(i),
        }
    }
}
