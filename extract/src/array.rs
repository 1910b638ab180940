//! Array interactions.
//!
//! Inside a single arrayed instance, every adjacent pair of elements
//! interacts identically, so the engine analyzes one representative pair
//! per direction and names the result with *ranged* subscripts: a record
//! mentioning `row[0:3]/a` applies to elements 0 through 3 at once. Three
//! canonical zones cover all adjacencies: the element above, the element
//! to the right, and the diagonal neighbor.

use crate::db::{ArraySpec, CellId, Instance};
use crate::diagnostics::Cause;
use crate::interact::Extractor;
use crate::yank::yank_element;

/// The three canonical adjacency directions: above, right, diagonal.
const ZONES: [(i64, i64); 3] = [(0, 1), (1, 0), (1, 1)];

impl<'a> Extractor<'a> {
    /// Processes the internal interactions of every arrayed instance of
    /// `cell`.
    pub(crate) fn process_arrays(&mut self, cell: CellId) {
        let instances: Vec<(usize, Instance)> = self
            .lib
            .cell(cell)
            .instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (i, inst.clone()))
            .collect();
        for (i, inst) in instances {
            let Some(spec) = inst.array else { continue };
            for (dx, dy) in ZONES {
                if (dx == 1 && spec.xcount() < 2) || (dy == 1 && spec.ycount() < 2) {
                    continue;
                }
                if self.cancel.is_cancelled() {
                    self.stats.cancelled = true;
                    self.stats.unfinished += 1;
                    return;
                }
                self.process_array_zone(cell, i, &inst, spec, dx, dy);
            }
        }
    }

    /// Processes one adjacency zone of one arrayed instance: the overlap
    /// of the halos of the base element and its neighbor in direction
    /// `(dx, dy)`.
    fn process_array_zone(
        &mut self,
        cell: CellId,
        instance: usize,
        inst: &Instance,
        spec: ArraySpec,
        dx: i64,
        dy: i64,
    ) {
        let halo = self.halo();
        let Some(child) = self.lib.bbox(inst.child) else {
            return;
        };
        let base = child.transform(inst.transform_for(spec.xlo, spec.ylo));
        let neighbor = child.transform(inst.transform_for(spec.xlo + dx, spec.ylo + dy));
        let Some(zone) = base
            .expand_all(halo)
            .intersection(neighbor.expand_all(halo))
        else {
            return;
        };
        if zone.is_empty() {
            return;
        }
        tracing::debug!(instance = %inst.name, dx, dy, ?zone, "processing array zone");

        // The base element stands for every element that has a neighbor
        // in this direction.
        let mut bufs = Vec::new();
        let mut primary = self.pool.allocate();
        let prefix = ranged_prefix(
            inst,
            spec,
            (spec.xlo, spec.xhi - dx),
            (spec.ylo, spec.yhi - dy),
        );
        yank_element(
            self.lib,
            instance,
            inst,
            spec.xlo,
            spec.ylo,
            zone,
            &prefix,
            &mut primary,
        );
        if primary.planes.is_empty() && primary.labels.is_empty() {
            self.pool.release(primary);
            self.issues.record(Cause::MissingPrimary {
                instance: inst.name.clone(),
                area: zone,
            });
            return;
        }
        bufs.push(primary);

        // Every other element reaching into the zone participates, named
        // by the subscript range shifted by its offset from the base.
        for (x, y) in inst.elements() {
            if (x, y) == (spec.xlo, spec.ylo) {
                continue;
            }
            if self.cancel.is_cancelled() {
                self.abort_interaction(bufs);
                return;
            }
            let Some(bbox) = self.lib.element_bbox(inst, x, y) else {
                continue;
            };
            if !bbox.touches(zone) {
                continue;
            }
            let (ox, oy) = (x - spec.xlo, y - spec.ylo);
            let xr = (spec.xlo + ox, (spec.xhi - dx + ox).min(spec.xhi));
            let yr = (spec.ylo + oy, (spec.yhi - dy + oy).min(spec.yhi));
            let prefix = ranged_prefix(inst, spec, xr, yr);
            let mut buf = self.pool.allocate();
            yank_element(self.lib, instance, inst, x, y, zone, &prefix, &mut buf);
            if buf.planes.is_empty() && buf.labels.is_empty() {
                self.pool.release(buf);
            } else {
                bufs.push(buf);
            }
        }
        if bufs.len() < 2 {
            for b in bufs {
                self.pool.release(b);
            }
            return;
        }
        self.process_interaction(cell, zone, zone, bufs);
    }
}

fn range_sub(lo: i64, hi: i64) -> String {
    if lo >= hi {
        lo.to_string()
    } else {
        format!("{lo}:{hi}")
    }
}

/// The ranged hierarchical prefix for a set of array elements, with the
/// same subscript shapes as [`crate::yank::element_prefix`].
fn ranged_prefix(inst: &Instance, spec: ArraySpec, xr: (i64, i64), yr: (i64, i64)) -> String {
    let xed = spec.xcount() > 1;
    let yed = spec.ycount() > 1;
    match (xed, yed) {
        (true, false) => format!("{}[{}]/", inst.name, range_sub(xr.0, xr.1)),
        (false, true) => format!("{}[{}]/", inst.name, range_sub(yr.0, yr.1)),
        _ => format!(
            "{}[{},{}]/",
            inst.name,
            range_sub(yr.0, yr.1),
            range_sub(xr.0, xr.1)
        ),
    }
}
