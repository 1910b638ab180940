//! The hierarchical extraction driver.
//!
//! The parent cell's area is cut into chunks of the technology's step
//! size. Each chunk is bloated by the coupling halo and searched for
//! *interactions*: places where two or more subtrees (or a subtree and
//! the parent's own paint) come within a halo of each other. Geometry
//! inside each interaction area is flattened into per-subtree yank
//! buffers plus a combined cumulative view; the difference between the
//! combined extraction and the sum of the per-subtree extractions is
//! emitted as incremental `merge`/`cap`/`subcap` records. Everything
//! outside interaction areas is already accounted for by the per-cell
//! extractions of the children and is never touched.

use std::collections::HashMap;

use geometry::prelude::*;
use itertools::Itertools;

use crate::context::{
    CancellationToken, ExtractOptions, ExtractionResult, ExtractionStats, InteractionContext,
};
use crate::coupling::find_coupling;
use crate::db::{CellId, Label, LabelKind, Library};
use crate::diagnostics::{Cause, IssueSet};
use crate::emit::{emit, Record};
use crate::hardway::HardWay;
use crate::node::{generated_name, NodeTable, ResolvedName};
use crate::region::{find_regions, RegionSet};
use crate::tech::TechStyle;
use crate::tile::{subtract, PlaneSet, Tile, TileKey};
use crate::yank::{yank_parent, yank_subtree, Buffer, BufferPool, BufferSource};

/// Extracts the hierarchical parasitics of `cell`, producing the
/// incremental records that adjust the flat per-cell extractions of its
/// children.
pub fn extract_hierarchical(
    lib: &Library,
    cell: CellId,
    tech: &TechStyle,
    opts: ExtractOptions,
    cancel: &CancellationToken,
) -> ExtractionResult {
    Extractor::new(lib, tech, opts, cancel.clone()).run(cell)
}

/// The extraction engine for one run.
pub struct Extractor<'a> {
    pub(crate) lib: &'a Library,
    pub(crate) tech: &'a TechStyle,
    pub(crate) opts: ExtractOptions,
    pub(crate) cancel: CancellationToken,
    pub(crate) pool: BufferPool,
    hardway: HardWay<'a>,
    pub(crate) issues: IssueSet,
    records: Vec<Record>,
    pub(crate) stats: ExtractionStats,
}

impl<'a> Extractor<'a> {
    /// Creates an engine over one library and technology style.
    pub fn new(
        lib: &'a Library,
        tech: &'a TechStyle,
        opts: ExtractOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lib,
            tech,
            opts,
            cancel,
            pool: BufferPool::new(tech.num_planes()),
            hardway: HardWay::new(lib, tech),
            issues: IssueSet::new(),
            records: Vec::new(),
            stats: ExtractionStats::default(),
        }
    }

    /// The sidewall coupling distance in effect.
    pub(crate) fn side_halo(&self) -> i64 {
        self.opts.side_halo.unwrap_or_else(|| self.tech.side_halo())
    }

    /// The interaction halo: subtrees within this distance of each other
    /// interact. One more than the coupling distance, so abutting and
    /// coupled geometry is always caught.
    pub(crate) fn halo(&self) -> i64 {
        self.side_halo() + 1
    }

    fn step_size(&self) -> i64 {
        self.opts.step_size.unwrap_or_else(|| self.tech.step_size()).max(1)
    }

    fn scale(&self) -> f64 {
        self.opts.scale.unwrap_or_else(|| self.tech.scale())
    }

    /// Runs the extraction to completion (or cancellation) and returns
    /// the accumulated result.
    pub fn run(mut self, cell: CellId) -> ExtractionResult {
        let span = tracing::info_span!("extract", cell = %self.lib.cell(cell).name());
        let _guard = span.enter();

        if let Some(bbox) = self.lib.bbox(cell) {
            let step = self.step_size();
            let nx = (bbox.width().max(1) + step - 1) / step;
            let ny = (bbox.height().max(1) + step - 1) / step;
            let total = (nx * ny) as usize;
            let mut done = 0;
            'chunks: for iy in 0..ny {
                for ix in 0..nx {
                    if self.cancel.is_cancelled() {
                        self.stats.cancelled = true;
                        self.stats.unfinished += total - done;
                        break 'chunks;
                    }
                    let chunk = Rect::from_sides(
                        bbox.left() + ix * step,
                        bbox.bot() + iy * step,
                        (bbox.left() + (ix + 1) * step).min(bbox.right()),
                        (bbox.bot() + (iy + 1) * step).min(bbox.top()),
                    );
                    self.stats.chunks += 1;
                    self.process_chunk(cell, chunk);
                    done += 1;
                }
            }
            if !self.stats.cancelled {
                self.process_arrays(cell);
            }
        }

        tracing::info!(
            chunks = self.stats.chunks,
            interactions = self.stats.interactions,
            records = self.records.len(),
            errors = self.issues.num_errors(),
            "extraction finished"
        );
        ExtractionResult {
            records: self.records,
            issues: self.issues,
            stats: self.stats,
        }
    }

    /// Locates the interaction area within one chunk and processes it.
    fn process_chunk(&mut self, cell: CellId, chunk: Rect) {
        let halo = self.halo();
        let bloat = chunk.expand_all(halo);
        let def = self.lib.cell(cell);

        // Participants: the parent's own paint and labels, and each child
        // instance, reduced to bounding boxes clipped to the bloated chunk.
        let mut parent_rect = def.planes.bbox();
        for label in &def.labels {
            if label.kind == LabelKind::NodeName && label.rect.touches(bloat) {
                parent_rect = Some(match parent_rect {
                    Some(r) => r.union(label.rect),
                    None => label.rect,
                });
            }
        }
        let mut parts: Vec<(Option<usize>, Rect)> = Vec::new();
        if let Some(r) = parent_rect.and_then(|r| r.intersection(bloat)) {
            parts.push((None, r));
        }
        for (i, inst) in def.instances.iter().enumerate() {
            if let Some(r) = self
                .lib
                .instance_bbox(inst)
                .and_then(|r| r.intersection(bloat))
            {
                parts.push((Some(i), r));
            }
        }

        // An interaction exists where two different participants come
        // within a halo of each other; the area is the union of the
        // halo-extended pairwise intersections.
        let mut area: Option<Rect> = None;
        for i in 0..parts.len() {
            for j in (i + 1)..parts.len() {
                let (a, b) = (parts[i].1, parts[j].1);
                for r in [
                    a.expand_all(halo).intersection(b),
                    b.expand_all(halo).intersection(a),
                ]
                .into_iter()
                .flatten()
                {
                    area = Some(match area {
                        Some(acc) => acc.union(r),
                        None => r,
                    });
                }
            }
        }
        let area = area.and_then(|r| r.intersection(bloat));
        let Some(area) = area else {
            self.stats.chunks_skipped += 1;
            return;
        };
        let Some(clip) = area.intersection(chunk) else {
            self.stats.chunks_skipped += 1;
            return;
        };

        // Yank each participant into its own flat buffer.
        let mut bufs = Vec::new();
        let mut parent = self.pool.allocate();
        yank_parent(self.lib, cell, area, &mut parent);
        if parent.planes.is_empty() && parent.labels.is_empty() {
            self.pool.release(parent);
        } else {
            bufs.push(parent);
        }
        for (inst_idx, rect) in &parts {
            let Some(i) = inst_idx else { continue };
            if !rect.touches(area) {
                continue;
            }
            let mut buf = self.pool.allocate();
            yank_subtree(self.lib, *i, &def.instances[*i], area, &mut buf);
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
            self.stats.chunks_skipped += 1;
            return;
        }

        tracing::debug!(?chunk, ?area, buffers = bufs.len(), "processing interaction");
        self.process_interaction(cell, area, clip, bufs);
    }

    /// Processes one interaction area given its yank buffers: resolves
    /// names per buffer, joins everything in a combined view, and emits
    /// the difference between the combined extraction and the sum of the
    /// per-buffer extractions.
    pub(crate) fn process_interaction(
        &mut self,
        cell: CellId,
        area: Rect,
        clip: Rect,
        mut bufs: Vec<Buffer>,
    ) {
        let mut ctx = InteractionContext::new(area, clip, self.tech.num_resist_classes());
        let side_halo = self.side_halo();

        // Regions and names per buffer.
        let mut interrupted = false;
        for i in 0..bufs.len() {
            let mut regions =
                find_regions(&bufs[i].planes, &bufs[i].labels, clip, self.tech, &self.cancel);
            self.stats.tiles_visited += regions.visited;
            if regions.interrupted {
                interrupted = true;
                break;
            }
            self.resolve_names(cell, &bufs[i], &mut regions, &mut ctx.nodes);
            bufs[i].regions = Some(regions);
        }
        if interrupted {
            self.abort_interaction(bufs);
            return;
        }

        // The combined view: every buffer's tiles and labels together.
        // Incoming paint is clipped against connected paint already there
        // from other buffers, as painting into one shared plane would
        // behave, so geometry covered by two subtrees is counted once.
        // Every buffer tile keeps an anchor tile in the combined view for
        // name resolution, even when it is covered entirely. Overlaps
        // between unconnected types are left in place and reported below.
        let mut cum = PlaneSet::new(self.tech.num_planes());
        let mut src: HashMap<TileKey, usize> = HashMap::new();
        let mut anchors: HashMap<(usize, TileKey), TileKey> = HashMap::new();
        let mut cum_labels: Vec<Label> = Vec::new();
        for (bi, buf) in bufs.iter().enumerate() {
            for (k, t) in buf.planes.all_tiles() {
                let earlier: Vec<(TileKey, Tile)> = cum
                    .tiles_overlapping(k.plane, t.rect)
                    .filter(|(ck, _)| src[ck] != bi)
                    .map(|(ck, c)| (ck, *c))
                    .collect();
                let mut pieces = vec![t.rect];
                let mut cover = None;
                for (ck, c) in &earlier {
                    if !self.tech.connected(t.ty, c.ty) {
                        continue;
                    }
                    cover.get_or_insert(*ck);
                    pieces = pieces
                        .into_iter()
                        .flat_map(|p| subtract(p, c.rect))
                        .collect();
                }
                for piece in pieces {
                    if let Some(ck) = cum.paint(k.plane, piece, t.ty) {
                        src.insert(ck, bi);
                        anchors.entry((bi, k)).or_insert(ck);
                    }
                }
                if let Some(ck) = cover {
                    anchors.entry((bi, k)).or_insert(ck);
                }
            }
            cum_labels.extend(buf.labels.iter().cloned());
        }

        self.check_illegal_overlaps(&cum, &src);

        let mut cum_regions = find_regions(&cum, &cum_labels, clip, self.tech, &self.cancel);
        self.stats.tiles_visited += cum_regions.visited;
        if cum_regions.interrupted {
            self.abort_interaction(bufs);
            return;
        }

        // Each combined region keeps the name of its first constituent
        // tile; every other constituent name becomes an alias.
        let mut chosen: Vec<Option<ResolvedName>> = vec![None; cum_regions.regions.len()];
        for (bi, buf) in bufs.iter().enumerate() {
            let Some(rs) = &buf.regions else { continue };
            for (bk, _) in buf.planes.all_tiles() {
                let Some(&anchor) = anchors.get(&(bi, bk)) else {
                    continue;
                };
                let Some(r) = cum_regions.region_of(anchor) else {
                    continue;
                };
                let Some(name) = rs.name_of(bk) else { continue };
                match &chosen[r] {
                    None => chosen[r] = Some(name.clone()),
                    Some(first) => {
                        if first.name != name.name {
                            let keep = ctx.nodes.resolve_or_create(&first.name, first.generated);
                            let absorb = ctx.nodes.resolve_or_create(&name.name, name.generated);
                            ctx.nodes.merge(keep, absorb);
                        }
                    }
                }
            }
        }
        // Labels that attached only in the combined view (e.g. a label
        // from one subtree over another subtree's paint) merge too.
        for (r, region) in cum_regions.regions.iter_mut().enumerate() {
            let Some(first) = chosen[r].take() else {
                continue;
            };
            let keep = ctx.nodes.resolve_or_create(&first.name, first.generated);
            for label in &region.labels {
                let other = ctx.nodes.resolve_or_create(label, false);
                ctx.nodes.merge(keep, other);
            }
            region.name = Some(first);
        }

        // Perimeter, area, and substrate cap: the combined view adds,
        // every buffer subtracts. Geometry present identically in both
        // cancels; only the hierarchical difference survives.
        for region in &cum_regions.regions {
            let Some(name) = &region.name else { continue };
            let id = ctx.nodes.resolve_or_create(&name.name, name.generated);
            ctx.nodes.add_cap(id, region.cap);
            for (class, pa) in region.pa.iter().enumerate() {
                ctx.nodes.add_perim_area(id, class, pa.perim, pa.area);
            }
        }
        for buf in &bufs {
            let Some(regions) = &buf.regions else { continue };
            for region in &regions.regions {
                let Some(name) = &region.name else { continue };
                let id = ctx.nodes.resolve_or_create(&name.name, name.generated);
                ctx.nodes.add_cap(id, -region.cap);
                for (class, pa) in region.pa.iter().enumerate() {
                    ctx.nodes.add_perim_area(id, class, -pa.perim, -pa.area);
                }
            }
        }

        // Coupling is differenced the same way, between node names.
        if self.tech.has_overlap_rules() || side_halo > 0 {
            let cum_an = find_coupling(&cum, &cum_regions, clip, self.tech, side_halo);
            ctx.coupling.add_scaled(&cum_an.table, 1.0);
            for (name, v) in cum_an.substrate {
                *ctx.substrate.entry(name).or_insert(0.0) += v;
            }
            for buf in &bufs {
                let Some(regions) = &buf.regions else { continue };
                let an = find_coupling(&buf.planes, regions, clip, self.tech, side_halo);
                ctx.coupling.add_scaled(&an.table, -1.0);
                for (name, v) in an.substrate {
                    *ctx.substrate.entry(name).or_insert(0.0) -= v;
                }
            }
        }

        // Substrate redirection folds into the node cap deltas.
        for (name, v) in &ctx.substrate {
            if *v != 0.0 {
                let id = ctx.nodes.resolve_or_create(name, false);
                ctx.nodes.add_cap(id, *v);
            }
        }

        emit(
            &ctx.nodes,
            &ctx.coupling,
            self.scale(),
            self.opts.epsilon,
            &mut self.records,
        );
        self.stats.interactions += 1;
        for b in bufs {
            self.pool.release(b);
        }
    }

    pub(crate) fn abort_interaction(&mut self, bufs: Vec<Buffer>) {
        self.stats.cancelled = true;
        self.stats.unfinished += 1;
        for b in bufs {
            self.pool.release(b);
        }
    }

    /// Resolves the node name of every region in a buffer: attached
    /// labels first, then the hard-way search of the unflattened
    /// subtree, then a generated name as a last resort. Array-element
    /// regions never receive generated names; an unresolvable one gets
    /// the `(none)` placeholder and a fatal diagnostic.
    fn resolve_names(
        &mut self,
        cell: CellId,
        buf: &Buffer,
        regions: &mut RegionSet,
        nodes: &mut NodeTable,
    ) {
        for region in &mut regions.regions {
            let resolved = if let Some(first) = region.labels.first() {
                let primary = ResolvedName {
                    name: first.clone(),
                    generated: false,
                };
                let keep = nodes.resolve_or_create(&primary.name, false);
                // Further labels on the same region are aliases.
                for alias in &region.labels[1..] {
                    let other = nodes.resolve_or_create(alias, false);
                    nodes.merge(keep, other);
                }
                primary
            } else if let Some(found) = self.hardway.resolve(
                cell,
                &buf.source,
                buf.ranged_prefix.as_deref(),
                region.ty,
                region.anchor,
            ) {
                nodes.resolve_or_create(&found.name, found.generated);
                found
            } else if matches!(buf.source, BufferSource::ArrayElement { .. }) {
                // Ranged array names must come from real labels; a
                // synthesized per-element name cannot stand for a whole
                // subscript range.
                let name = arcstr::literal!("(none)");
                self.issues.record(Cause::UnresolvableName {
                    area: region.anchor,
                    plane: self.tech.plane(region.plane).name.clone(),
                });
                nodes.resolve_or_create(&name, true);
                ResolvedName {
                    name,
                    generated: true,
                }
            } else {
                let name = generated_name(self.tech, region.plane, region.ll);
                self.issues.record(Cause::GeneratedName {
                    name: name.clone(),
                    area: region.anchor,
                });
                nodes.resolve_or_create(&name, true);
                ResolvedName {
                    name,
                    generated: true,
                }
            };
            region.name = Some(resolved);
        }
    }

    /// Reports overlaps between unconnected types from different
    /// buffers on the same plane.
    fn check_illegal_overlaps(&mut self, cum: &PlaneSet, src: &HashMap<TileKey, usize>) {
        for plane in self.tech.plane_ids() {
            let tiles: Vec<_> = cum.tiles(plane).map(|(k, t)| (k, *t)).collect();
            for ((ka, a), (kb, b)) in tiles.iter().tuple_combinations() {
                if src[ka] == src[kb] {
                    continue;
                }
                if a.rect.overlaps(b.rect) && !self.tech.connected(a.ty, b.ty) {
                    self.issues.record(Cause::IllegalOverlap {
                        area: a.rect.intersection(b.rect).unwrap_or(a.rect),
                        plane: self.tech.plane(plane).name.clone(),
                        type_a: self.tech.type_info(a.ty).name.clone(),
                        type_b: self.tech.type_info(b.ty).name.clone(),
                    });
                }
            }
        }
    }
}
