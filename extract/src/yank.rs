//! Yank buffers: flattened copies of subtree geometry within an
//! interaction area.
//!
//! Yanking deep-copies a subtree's paint and node-name labels into a
//! flat [`Buffer`], clipping to the interaction area and rewriting label
//! text with the hierarchical path prefix of the instance it came from.
//! Buffers are recycled through a [`BufferPool`] so interaction
//! processing does not reallocate plane storage per area.

use geometry::prelude::*;

use crate::db::{CellId, Instance, Label, LabelKind, Library};
use crate::region::RegionSet;
use crate::tile::PlaneSet;

/// Where a buffer's contents were yanked from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BufferSource {
    /// The buffer is unused.
    #[default]
    None,
    /// The parent cell's own mask geometry, not flattened.
    Parent,
    /// One child subtree, flattened through all levels.
    Subtree {
        /// The index of the instance in its parent's instance list.
        instance: usize,
    },
    /// One element of an arrayed instance, yanked with a ranged prefix.
    ArrayElement {
        /// The index of the arrayed instance in its parent.
        instance: usize,
        /// The element's x subscript.
        x: i64,
        /// The element's y subscript.
        y: i64,
    },
}

/// A flattened copy of some geometry clipped to an interaction area.
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    /// The flattened paint.
    pub planes: PlaneSet,
    /// Node-name labels, text already rewritten with hierarchical
    /// prefixes. Attribute labels are never yanked.
    pub labels: Vec<Label>,
    /// The regions found over this buffer, once computed.
    pub regions: Option<RegionSet>,
    /// What the buffer was yanked from.
    pub source: BufferSource,
    /// For array-element buffers, the ranged subscript prefix the
    /// element's labels were rewritten with.
    pub ranged_prefix: Option<String>,
}

impl Buffer {
    /// Empties the buffer for reuse. Plane storage is retained.
    pub fn clear(&mut self) {
        self.planes.clear();
        self.labels.clear();
        self.regions = None;
        self.source = BufferSource::None;
        self.ranged_prefix = None;
    }
}

/// A free list of yank buffers sharing one plane count.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Vec<Buffer>,
    num_planes: usize,
}

impl BufferPool {
    /// Creates a pool producing buffers with `num_planes` planes.
    pub fn new(num_planes: usize) -> Self {
        Self {
            free: Vec::new(),
            num_planes,
        }
    }

    /// Takes an empty buffer from the pool, allocating if none is free.
    pub fn allocate(&mut self) -> Buffer {
        self.free.pop().unwrap_or_else(|| Buffer {
            planes: PlaneSet::new(self.num_planes),
            ..Buffer::default()
        })
    }

    /// Returns a buffer to the pool. The buffer is cleared here, so
    /// callers may hand back buffers still holding stale contents.
    pub fn release(&mut self, mut buf: Buffer) {
        buf.clear();
        self.free.push(buf);
    }
}

/// The hierarchical path component contributed by one element of an
/// instance: `name/` for simple instances, `name[x]/`, `name[y]/`, or
/// `name[y,x]/` for arrays depending on which dimensions are arrayed.
pub fn element_prefix(inst: &Instance, x: i64, y: i64) -> String {
    match inst.array {
        None => format!("{}/", inst.name),
        Some(a) => {
            let xed = a.xcount() > 1;
            let yed = a.ycount() > 1;
            match (xed, yed) {
                (true, false) => format!("{}[{}]/", inst.name, x),
                (false, true) => format!("{}[{}]/", inst.name, y),
                _ => format!("{}[{},{}]/", inst.name, y, x),
            }
        }
    }
}

/// Copies the parent cell's own paint and node-name labels into `buf`,
/// clipped to `area`. Child instances are not descended into.
pub fn yank_parent(lib: &Library, cell: CellId, area: Rect, buf: &mut Buffer) {
    buf.source = BufferSource::Parent;
    let def = lib.cell(cell);
    def.planes
        .copy_clipped(&mut buf.planes, Transformation::identity(), area);
    copy_labels(&def.labels, Transformation::identity(), area, "", buf);
}

/// Flattens every element of `inst` whose bounding box touches `area`
/// into `buf`, recursing through all hierarchy levels. Labels acquire
/// the full hierarchical prefix of the element they came from.
pub fn yank_subtree(
    lib: &Library,
    instance: usize,
    inst: &Instance,
    area: Rect,
    buf: &mut Buffer,
) {
    buf.source = BufferSource::Subtree { instance };
    for (x, y) in inst.elements() {
        let Some(bbox) = lib.element_bbox(inst, x, y) else {
            continue;
        };
        if !bbox.touches(area) {
            continue;
        }
        let prefix = element_prefix(inst, x, y);
        yank_def(lib, inst.child, inst.transform_for(x, y), area, &prefix, buf);
    }
}

/// Flattens a single array element into `buf` under an explicit
/// (typically ranged) prefix.
pub fn yank_element(
    lib: &Library,
    instance: usize,
    inst: &Instance,
    x: i64,
    y: i64,
    area: Rect,
    prefix: &str,
    buf: &mut Buffer,
) {
    buf.source = BufferSource::ArrayElement { instance, x, y };
    buf.ranged_prefix = Some(prefix.to_string());
    yank_def(lib, inst.child, inst.transform_for(x, y), area, prefix, buf);
}

fn yank_def(
    lib: &Library,
    cell: CellId,
    trans: Transformation,
    clip: Rect,
    prefix: &str,
    buf: &mut Buffer,
) {
    let def = lib.cell(cell);
    def.planes.copy_clipped(&mut buf.planes, trans, clip);
    copy_labels(&def.labels, trans, clip, prefix, buf);
    for inst in &def.instances {
        for (x, y) in inst.elements() {
            let Some(bbox) = lib.element_bbox(inst, x, y) else {
                continue;
            };
            if !bbox.transform(trans).touches(clip) {
                continue;
            }
            let prefix = format!("{prefix}{}", element_prefix(inst, x, y));
            let trans = Transformation::cascade(inst.transform_for(x, y), trans);
            yank_def(lib, inst.child, trans, clip, &prefix, buf);
        }
    }
}

fn copy_labels(labels: &[Label], trans: Transformation, clip: Rect, prefix: &str, buf: &mut Buffer) {
    for label in labels {
        if label.kind != LabelKind::NodeName {
            continue;
        }
        let rect = label.rect.transform(trans);
        if !rect.touches(clip) {
            continue;
        }
        buf.labels.push(Label {
            text: arcstr::format!("{prefix}{}", label.text),
            rect,
            ty: label.ty,
            kind: LabelKind::NodeName,
        });
    }
}
