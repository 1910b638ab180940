//! The hard-way name search.
//!
//! When a region's flattened geometry carries no label inside the
//! interaction area, its name is searched for "the hard way": descend
//! the unflattened subtree the geometry was yanked from, looking for a
//! node-name label of a type connected to the region's anchor type
//! touching the anchor area, and build the hierarchical name from the
//! path walked. Results are cached per (cell, type, local area) so
//! repeated interactions over the same subtree do not repeat the
//! descent.

use std::collections::HashMap;

use arcstr::ArcStr;
use geometry::prelude::*;

use crate::db::{CellId, Library};
use crate::node::ResolvedName;
use crate::tech::{TechStyle, TileTypeId};
use crate::yank::{element_prefix, BufferSource};

/// A cached hard-way searcher over one library.
pub struct HardWay<'a> {
    lib: &'a Library,
    tech: &'a TechStyle,
    /// Keyed by (cell, anchor type, query area in cell coordinates);
    /// values are names relative to the cell, so one entry serves every
    /// instance of the cell.
    cache: HashMap<(CellId, TileTypeId, Rect), Option<ArcStr>>,
}

impl<'a> HardWay<'a> {
    /// Creates a searcher with an empty cache.
    pub fn new(lib: &'a Library, tech: &'a TechStyle) -> Self {
        Self {
            lib,
            tech,
            cache: HashMap::new(),
        }
    }

    /// Searches for a node-name label connected to type `ty` touching
    /// `area` (parent coordinates) in the subtree a buffer was yanked
    /// from. Returns the full hierarchical name, or [`None`] if the
    /// subtree holds no such label there.
    pub fn resolve(
        &mut self,
        root: CellId,
        source: &BufferSource,
        ranged_prefix: Option<&str>,
        ty: TileTypeId,
        area: Rect,
    ) -> Option<ResolvedName> {
        let name = match *source {
            BufferSource::None => None,
            BufferSource::Parent => self.search_cell(root, ty, area),
            BufferSource::Subtree { instance } => {
                let inst = &self.lib.cell(root).instances[instance];
                let mut found = None;
                for (x, y) in inst.elements() {
                    let Some(bbox) = self.lib.element_bbox(inst, x, y) else {
                        continue;
                    };
                    if !bbox.touches(area) {
                        continue;
                    }
                    let local = area.transform(inst.transform_for(x, y).inv());
                    if let Some(rel) = self.search_cell(inst.child, ty, local) {
                        found = Some(arcstr::format!("{}{rel}", element_prefix(inst, x, y)));
                        break;
                    }
                }
                found
            }
            BufferSource::ArrayElement { instance, x, y } => {
                let inst = &self.lib.cell(root).instances[instance];
                let local = area.transform(inst.transform_for(x, y).inv());
                self.search_cell(inst.child, ty, local).map(|rel| {
                    match ranged_prefix {
                        Some(p) => arcstr::format!("{p}{rel}"),
                        None => arcstr::format!("{}{rel}", element_prefix(inst, x, y)),
                    }
                })
            }
        };
        name.map(|name| ResolvedName {
            name,
            generated: false,
        })
    }

    /// Searches one cell (coordinates local to the cell), descending into
    /// child instances whose bounding boxes touch the area. Labels whose
    /// type does not connect to `ty` are skipped, so a label over an
    /// unconnected net abutting the area is never adopted. Results are
    /// relative to the cell.
    fn search_cell(&mut self, cell: CellId, ty: TileTypeId, area: Rect) -> Option<ArcStr> {
        let key = (cell, ty, area);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let def = self.lib.cell(cell);
        let mut found = def
            .labels
            .iter()
            .find(|l| {
                l.kind == crate::db::LabelKind::NodeName
                    && self.tech.connected(l.ty, ty)
                    && l.rect.touches(area)
            })
            .map(|l| l.text.clone());

        if found.is_none() {
            'outer: for inst in &def.instances {
                for (x, y) in inst.elements() {
                    let Some(bbox) = self.lib.element_bbox(inst, x, y) else {
                        continue;
                    };
                    if !bbox.touches(area) {
                        continue;
                    }
                    let local = area.transform(inst.transform_for(x, y).inv());
                    if let Some(rel) = self.search_cell(inst.child, ty, local) {
                        found = Some(arcstr::format!("{}{rel}", element_prefix(inst, x, y)));
                        break 'outer;
                    }
                }
            }
        }

        self.cache.insert(key, found.clone());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CellDef, Instance, LabelKind};
    use crate::tech::TechStyle;

    fn nested_library() -> (Library, TechStyle, CellId, usize, TileTypeId) {
        let mut tech = TechStyle::new();
        let plane = tech.add_plane("metal1", 1);
        let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);

        let mut lib = Library::new();
        let mut leaf = CellDef::new("leaf", 1);
        leaf.planes.paint(plane, Rect::from_sides(0, 0, 10, 10), m1);
        leaf.add_label("net", Rect::from_point(Point::new(2, 2)), m1, LabelKind::NodeName);
        let leaf = lib.add_cell(leaf);

        let mut mid = CellDef::new("mid", 1);
        mid.add_instance(Instance::new("x1", leaf, Transformation::translate(30, 0)));
        let mid = lib.add_cell(mid);

        let mut top = CellDef::new("top", 1);
        let idx = top.add_instance(Instance::new("m0", mid, Transformation::translate(0, 40)));
        let top = lib.add_cell(top);
        (lib, tech, top, idx, m1)
    }

    #[test]
    fn resolves_through_two_levels() {
        let (lib, tech, top, idx, m1) = nested_library();
        let mut hw = HardWay::new(&lib, &tech);
        // The leaf label sits at (32, 42) in top coordinates.
        let name = hw.resolve(
            top,
            &BufferSource::Subtree { instance: idx },
            None,
            m1,
            Rect::from_sides(30, 40, 40, 50),
        );
        assert_eq!(
            name,
            Some(ResolvedName {
                name: arcstr::literal!("m0/x1/net"),
                generated: false
            })
        );
    }

    #[test]
    fn misses_return_none() {
        let (lib, tech, top, idx, m1) = nested_library();
        let mut hw = HardWay::new(&lib, &tech);
        let name = hw.resolve(
            top,
            &BufferSource::Subtree { instance: idx },
            None,
            m1,
            Rect::from_sides(500, 500, 510, 510),
        );
        assert_eq!(name, None);
    }

    #[test]
    fn unconnected_labels_are_not_adopted() {
        let mut tech = TechStyle::new();
        let plane = tech.add_plane("metal1", 1);
        let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);
        let poly = tech.add_type("poly", plane, 0, 0.0, 0.0);

        let mut lib = Library::new();
        let mut leaf = CellDef::new("leaf", 1);
        leaf.planes.paint(plane, Rect::from_sides(0, 0, 10, 10), poly);
        leaf.add_label("stray", Rect::from_sides(0, 0, 10, 10), poly, LabelKind::NodeName);
        let leaf = lib.add_cell(leaf);
        let mut top = CellDef::new("top", 1);
        let idx = top.add_instance(Instance::new("x0", leaf, Transformation::identity()));
        let top = lib.add_cell(top);

        // A label over an unconnected net touching the query area must
        // not name the region, however close it sits.
        let mut hw = HardWay::new(&lib, &tech);
        let source = BufferSource::Subtree { instance: idx };
        let area = Rect::from_sides(0, 0, 10, 10);
        assert_eq!(hw.resolve(top, &source, None, m1, area), None);
        let found = hw.resolve(top, &source, None, poly, area);
        assert_eq!(found.unwrap().name, "x0/stray");
    }

    #[test]
    fn ranged_prefix_overrides_element_prefix() {
        let (lib, tech, top, idx, m1) = nested_library();
        let mut hw = HardWay::new(&lib, &tech);
        let name = hw.resolve(
            top,
            &BufferSource::ArrayElement {
                instance: idx,
                x: 0,
                y: 0,
            },
            Some("m0[0:3]/"),
            m1,
            Rect::from_sides(30, 40, 40, 50),
        );
        assert_eq!(name.unwrap().name, "m0[0:3]/x1/net");
    }
}
