//! The hierarchical cell database consumed by the extractor.
//!
//! A [`Library`] is an arena of [`CellDef`]s keyed by opaque [`CellId`]s.
//! Each definition owns its own mask geometry (tile planes), a label
//! list, and child [`Instance`]s, which may be arrayed. The extractor
//! reads the database through instance traversal, per-element transforms,
//! bounding boxes, and label lists only.

use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tech::TileTypeId;
use crate::tile::PlaneSet;

/// An opaque cell identifier.
///
/// A cell ID created in the context of one library must *not* be used in
/// the context of another library.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellId(u64);

impl Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell{}", self.0)
    }
}

/// The class of a label.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum LabelKind {
    /// A node name. The only label class the extractor propagates.
    NodeName,
    /// An attribute or annotation. Never copied into yank buffers.
    Attribute,
}

/// A textual label placed over geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    /// The label text.
    pub text: ArcStr,
    /// The area the label is attached to. May be a zero-area point.
    pub rect: Rect,
    /// The type of geometry the label names. A label only attaches to
    /// tiles whose type connects to this one.
    pub ty: TileTypeId,
    /// The label class.
    pub kind: LabelKind,
}

/// Array subscript ranges and element pitch for an arrayed instance.
///
/// Element `(x, y)` with `xlo <= x <= xhi` and `ylo <= y <= yhi` is
/// offset from the base element by `((x - xlo) * xsep, (y - ylo) * ysep)`
/// in parent coordinates.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArraySpec {
    /// The low x subscript.
    pub xlo: i64,
    /// The high x subscript (inclusive).
    pub xhi: i64,
    /// The low y subscript.
    pub ylo: i64,
    /// The high y subscript (inclusive).
    pub yhi: i64,
    /// The x pitch between consecutive elements.
    pub xsep: i64,
    /// The y pitch between consecutive elements.
    pub ysep: i64,
}

impl ArraySpec {
    /// The number of elements along x.
    pub fn xcount(&self) -> i64 {
        self.xhi - self.xlo + 1
    }

    /// The number of elements along y.
    pub fn ycount(&self) -> i64 {
        self.yhi - self.ylo + 1
    }
}

/// An instance of a child cell within a parent definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    /// The instance name, used as the hierarchical path component.
    pub name: ArcStr,
    /// The instantiated cell.
    pub child: CellId,
    /// The transform from child coordinates to parent coordinates for
    /// the base element.
    pub trans: Transformation,
    /// Array subscripts, if this instance is arrayed.
    pub array: Option<ArraySpec>,
}

impl Instance {
    /// Creates a non-arrayed instance.
    pub fn new(name: impl Into<ArcStr>, child: CellId, trans: Transformation) -> Self {
        Self {
            name: name.into(),
            child,
            trans,
            array: None,
        }
    }

    /// Creates an arrayed instance.
    pub fn new_array(
        name: impl Into<ArcStr>,
        child: CellId,
        trans: Transformation,
        array: ArraySpec,
    ) -> Self {
        Self {
            name: name.into(),
            child,
            trans,
            array: Some(array),
        }
    }

    /// The transform from child coordinates to parent coordinates for
    /// array element `(x, y)`. Subscripts are ignored for non-arrayed
    /// instances.
    pub fn transform_for(&self, x: i64, y: i64) -> Transformation {
        match self.array {
            None => self.trans,
            Some(a) => Transformation::cascade(
                self.trans,
                Transformation::translate((x - a.xlo) * a.xsep, (y - a.ylo) * a.ysep),
            ),
        }
    }

    /// Iterates over all element subscripts, x-major within y.
    pub fn elements(&self) -> impl Iterator<Item = (i64, i64)> {
        let (xlo, xhi, ylo, yhi) = match self.array {
            None => (0, 0, 0, 0),
            Some(a) => (a.xlo, a.xhi, a.ylo, a.yhi),
        };
        (ylo..=yhi).flat_map(move |y| (xlo..=xhi).map(move |x| (x, y)))
    }
}

/// A cell definition: paint, labels, and child instances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellDef {
    name: ArcStr,
    /// The cell's own mask geometry.
    pub planes: PlaneSet,
    /// The cell's labels, in placement order.
    pub labels: Vec<Label>,
    /// Child instances, in placement order.
    pub instances: Vec<Instance>,
}

impl CellDef {
    /// Creates an empty definition with the given number of planes.
    pub fn new(name: impl Into<ArcStr>, num_planes: usize) -> Self {
        Self {
            name: name.into(),
            planes: PlaneSet::new(num_planes),
            labels: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// The name of the cell.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Adds a label to the cell.
    pub fn add_label(
        &mut self,
        text: impl Into<ArcStr>,
        rect: Rect,
        ty: TileTypeId,
        kind: LabelKind,
    ) {
        self.labels.push(Label {
            text: text.into(),
            rect,
            ty,
            kind,
        });
    }

    /// Adds a child instance, returning its index.
    pub fn add_instance(&mut self, instance: Instance) -> usize {
        self.instances.push(instance);
        self.instances.len() - 1
    }
}

/// An error arising from a library lookup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LibraryError {
    /// The given cell ID does not exist in this library.
    #[error("no cell with ID {0}")]
    MissingCell(CellId),
    /// No cell with the given name exists in this library.
    #[error("no cell named `{0}`")]
    MissingCellNamed(ArcStr),
}

/// A library of cell definitions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Library {
    /// The current ID counter. Incremented before assigning a new ID.
    cell_id: u64,
    cells: IndexMap<CellId, CellDef>,
    name_map: HashMap<ArcStr, CellId>,
}

impl Library {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell to the library, returning its ID.
    pub fn add_cell(&mut self, cell: CellDef) -> CellId {
        self.cell_id += 1;
        let id = CellId(self.cell_id);
        self.name_map.insert(cell.name.clone(), id);
        self.cells.insert(id, cell);
        id
    }

    /// The cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is not valid for this library; see
    /// [`Library::try_cell`] for a non-panicking variant.
    pub fn cell(&self, id: CellId) -> &CellDef {
        self.cells.get(&id).expect("invalid cell ID")
    }

    /// The cell with the given ID, or an error if it does not exist.
    pub fn try_cell(&self, id: CellId) -> Result<&CellDef, LibraryError> {
        self.cells.get(&id).ok_or(LibraryError::MissingCell(id))
    }

    /// A mutable reference to the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is not valid for this library.
    pub fn cell_mut(&mut self, id: CellId) -> &mut CellDef {
        self.cells.get_mut(&id).expect("invalid cell ID")
    }

    /// Looks up a cell by name.
    pub fn cell_named(&self, name: &str) -> Result<CellId, LibraryError> {
        self.name_map
            .get(name)
            .copied()
            .ok_or_else(|| LibraryError::MissingCellNamed(name.into()))
    }

    /// Iterates over all cells in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &CellDef)> {
        self.cells.iter().map(|(id, cell)| (*id, cell))
    }

    /// The bounding box of a cell, including all child instances,
    /// or [`None`] if the subtree contains no geometry.
    pub fn bbox(&self, id: CellId) -> Option<Rect> {
        let def = self.cell(id);
        let mut bbox = def.planes.bbox();
        for inst in &def.instances {
            if let Some(b) = self.instance_bbox(inst) {
                bbox = Some(match bbox {
                    Some(acc) => acc.union(b),
                    None => b,
                });
            }
        }
        bbox
    }

    /// The bounding box of all elements of an instance in parent
    /// coordinates.
    pub fn instance_bbox(&self, inst: &Instance) -> Option<Rect> {
        let child = self.bbox(inst.child)?;
        match inst.array {
            None => Some(child.transform(inst.trans)),
            Some(a) => {
                let mut acc: Option<Rect> = None;
                for (x, y) in [(a.xlo, a.ylo), (a.xlo, a.yhi), (a.xhi, a.ylo), (a.xhi, a.yhi)] {
                    let b = child.transform(inst.transform_for(x, y));
                    acc = Some(match acc {
                        Some(r) => r.union(b),
                        None => b,
                    });
                }
                acc
            }
        }
    }

    /// The bounding box of one array element (or of the sole element of
    /// a non-arrayed instance) in parent coordinates.
    pub fn element_bbox(&self, inst: &Instance, x: i64, y: i64) -> Option<Rect> {
        let child = self.bbox(inst.child)?;
        Some(child.transform(inst.transform_for(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::TechStyle;

    #[test]
    fn array_element_transforms_step_by_pitch() {
        let inst = Instance::new_array(
            "xarr",
            CellId(1),
            Transformation::translate(5, 0),
            ArraySpec {
                xlo: 1,
                xhi: 4,
                ylo: 0,
                yhi: 0,
                xsep: 20,
                ysep: 0,
            },
        );
        let p = Point::new(0, 0);
        assert_eq!(inst.transform_for(1, 0).apply_point(p), Point::new(5, 0));
        assert_eq!(inst.transform_for(3, 0).apply_point(p), Point::new(45, 0));
        assert_eq!(inst.elements().count(), 4);
    }

    #[test]
    fn bbox_includes_arrayed_children() {
        let mut tech = TechStyle::new();
        let plane = tech.add_plane("metal1", 1);
        let m1 = tech.add_type("m1", plane, 0, 0.0, 0.0);

        let mut lib = Library::new();
        let mut leaf = CellDef::new("leaf", 1);
        leaf.planes.paint(plane, Rect::from_sides(0, 0, 10, 10), m1);
        let leaf = lib.add_cell(leaf);

        let mut top = CellDef::new("top", 1);
        top.add_instance(Instance::new_array(
            "xa",
            leaf,
            Transformation::identity(),
            ArraySpec {
                xlo: 0,
                xhi: 2,
                ylo: 0,
                yhi: 0,
                xsep: 30,
                ysep: 0,
            },
        ));
        let top = lib.add_cell(top);

        assert_eq!(lib.bbox(top), Some(Rect::from_sides(0, 0, 70, 10)));
        assert_eq!(lib.bbox(leaf), Some(Rect::from_sides(0, 0, 10, 10)));
    }

    #[test]
    fn cell_lookup_by_name() {
        let mut lib = Library::new();
        let id = lib.add_cell(CellDef::new("top", 1));
        assert_eq!(lib.cell_named("top").unwrap(), id);
        assert!(matches!(
            lib.cell_named("nope"),
            Err(LibraryError::MissingCellNamed(_))
        ));
    }
}
