//! Coupling capacitance: overlap, sidewall, and sidewall-overlap.
//!
//! Coupling is charged between node *names*, so the same table works for
//! both the cumulative buffer and the per-subtree buffers; the
//! hierarchical adjustment is the signed sum of the two. Overlap coupling
//! additionally redirects the upper node's substrate capacitance, since
//! the overlapped area no longer sees substrate.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;

use crate::region::RegionSet;
use crate::tech::{PlaneId, TechStyle};
use crate::tile::{clip_contains, PlaneSet, TileKey};

/// A table of coupling capacitances keyed by unordered node-name pairs.
#[derive(Clone, Debug, Default)]
pub struct CouplingTable {
    entries: IndexMap<(ArcStr, ArcStr), f64>,
}

fn canonical(a: &ArcStr, b: &ArcStr) -> (ArcStr, ArcStr) {
    if a.as_str() <= b.as_str() {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl CouplingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds coupling between two nodes. The pair is stored unordered.
    pub fn add(&mut self, a: &ArcStr, b: &ArcStr, value: f64) {
        *self.entries.entry(canonical(a, b)).or_insert(0.0) += value;
    }

    /// The accumulated coupling between two nodes, zero if absent.
    pub fn get(&self, a: &ArcStr, b: &ArcStr) -> f64 {
        self.entries.get(&canonical(a, b)).copied().unwrap_or(0.0)
    }

    /// Adds `scale` times every entry of `other` into this table.
    pub fn add_scaled(&mut self, other: &CouplingTable, scale: f64) {
        for (pair, value) in &other.entries {
            *self.entries.entry(pair.clone()).or_insert(0.0) += value * scale;
        }
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&(ArcStr, ArcStr), f64)> {
        self.entries.iter().map(|(pair, value)| (pair, *value))
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The coupling found over one buffer: node-pair coupling plus substrate
/// redirection per node.
#[derive(Clone, Debug, Default)]
pub struct CouplingAnalysis {
    /// Coupling capacitance per node pair.
    pub table: CouplingTable,
    /// Substrate-capacitance adjustments (usually negative) per node.
    pub substrate: IndexMap<ArcStr, f64>,
}

impl CouplingAnalysis {
    fn redirect_substrate(&mut self, name: &ArcStr, delta: f64) {
        *self.substrate.entry(name.clone()).or_insert(0.0) += delta;
    }
}

/// Finds all coupling capacitance in `planes`, restricted to `clip`.
/// Region names must already be resolved.
pub fn find_coupling(
    planes: &PlaneSet,
    regions: &RegionSet,
    clip: Rect,
    tech: &TechStyle,
    halo: i64,
) -> CouplingAnalysis {
    let mut analysis = CouplingAnalysis::default();
    if !tech.has_overlap_rules() && halo == 0 {
        return analysis;
    }
    find_overlap(planes, regions, clip, tech, &mut analysis);
    if halo > 0 {
        find_sidewall(planes, regions, clip, tech, halo, &mut analysis);
        find_sidewall_overlap(planes, regions, clip, tech, halo, &mut analysis);
    }
    analysis
}

fn name_of<'a>(regions: &'a RegionSet, key: TileKey) -> Option<&'a ArcStr> {
    regions.name_of(key).map(|n| &n.name)
}

/// Overlap coupling between planes of strictly decreasing stacking
/// order. Shield types on intervening planes block the coupled area.
fn find_overlap(
    planes: &PlaneSet,
    regions: &RegionSet,
    clip: Rect,
    tech: &TechStyle,
    analysis: &mut CouplingAnalysis,
) {
    for upper in tech.plane_ids() {
        for lower in tech.plane_ids() {
            if tech.plane(upper).order <= tech.plane(lower).order {
                continue;
            }
            overlap_planes(planes, regions, clip, tech, upper, lower, analysis);
        }
    }
}

fn overlap_planes(
    planes: &PlaneSet,
    regions: &RegionSet,
    clip: Rect,
    tech: &TechStyle,
    upper: PlaneId,
    lower: PlaneId,
    analysis: &mut CouplingAnalysis,
) {
    for (kt, t) in planes.tiles(upper) {
        for (ks, s) in planes.tiles(lower) {
            let Some(rule) = tech.overlap_rule(t.ty, s.ty) else {
                continue;
            };
            let Some(ov) = t
                .rect
                .intersection(s.rect)
                .and_then(|r| r.intersection(clip))
            else {
                continue;
            };
            if ov.is_empty() {
                continue;
            }

            let mut shielded = 0;
            for q in tech.shield_planes(upper, lower) {
                for (_, sh) in planes.tiles_overlapping(q, ov) {
                    if rule.shield_types.contains(&sh.ty) {
                        if let Some(r) = sh.rect.intersection(ov) {
                            shielded += r.area();
                        }
                    }
                }
            }
            let remaining = (ov.area() - shielded).max(0) as f64;
            if remaining == 0.0 {
                continue;
            }

            let (Some(tn), Some(sn)) = (name_of(regions, kt), name_of(regions, ks)) else {
                continue;
            };
            // The upper tile no longer sees substrate over the overlap,
            // whether or not the two tiles are the same node.
            let redirect = -tech.type_info(t.ty).area_cap * remaining;
            let tn = tn.clone();
            let sn = sn.clone();
            analysis.redirect_substrate(&tn, redirect);
            if tn != sn {
                analysis.table.add(&tn, &sn, rule.cap * remaining);
            }
        }
    }
}

/// Sidewall coupling between facing edges on the same plane, charged as
/// `cap * common_length / separation` for separations within the halo.
fn find_sidewall(
    planes: &PlaneSet,
    regions: &RegionSet,
    clip: Rect,
    tech: &TechStyle,
    halo: i64,
    analysis: &mut CouplingAnalysis,
) {
    for plane in tech.plane_ids() {
        for (kt, t) in planes.tiles(plane) {
            for edge in t.edges() {
                if !clip_contains(clip.span(!edge.side.edge_dir()), edge.coord) {
                    continue;
                }
                let Some(span) = edge.span.intersection(clip.span(edge.side.edge_dir())) else {
                    continue;
                };
                if span.length() == 0 {
                    continue;
                }

                for (ks, s) in planes.tiles_touching(plane, edge.band(halo)) {
                    if ks == kt {
                        continue;
                    }
                    let Some(rule) = tech.sidewall_rule(t.ty, s.ty) else {
                        continue;
                    };
                    let sep =
                        (s.rect.side_coord(edge.side.opposite()) - edge.coord) * edge.side.sign();
                    if sep < 1 || sep > halo {
                        continue;
                    }
                    let Some(common) = span.intersection(s.rect.span(edge.side.edge_dir()))
                    else {
                        continue;
                    };
                    if common.length() == 0 {
                        continue;
                    }
                    let (Some(tn), Some(sn)) = (name_of(regions, kt), name_of(regions, ks))
                    else {
                        continue;
                    };
                    if tn != sn {
                        let (tn, sn) = (tn.clone(), sn.clone());
                        analysis
                            .table
                            .add(&tn, &sn, rule.cap * common.length() as f64 / sep as f64);
                    }
                }
            }
        }
    }
}

/// Coupling from a tile edge to tiles on other planes overlapping the
/// halo band beyond the edge, charged per unit overlapped length.
fn find_sidewall_overlap(
    planes: &PlaneSet,
    regions: &RegionSet,
    clip: Rect,
    tech: &TechStyle,
    halo: i64,
    analysis: &mut CouplingAnalysis,
) {
    for plane in tech.plane_ids() {
        for (kt, t) in planes.tiles(plane) {
            for edge in t.edges() {
                if !clip_contains(clip.span(!edge.side.edge_dir()), edge.coord) {
                    continue;
                }
                let Some(band) = edge.band(halo).intersection(clip) else {
                    continue;
                };
                if band.is_empty() {
                    continue;
                }

                for q in tech.plane_ids() {
                    if q == plane {
                        continue;
                    }
                    for (ks, s) in planes.tiles_overlapping(q, band) {
                        let Some(rule) = tech.sidewall_overlap_rule(t.ty, s.ty) else {
                            continue;
                        };
                        let Some(r) = s.rect.intersection(band) else {
                            continue;
                        };
                        let dir = edge.side.edge_dir();
                        let mut covered = 0;
                        for shield in tech.shield_planes(plane, q) {
                            for (_, sh) in planes.tiles_overlapping(shield, r) {
                                if rule.shield_types.contains(&sh.ty) {
                                    if let Some(c) = sh.rect.intersection(r) {
                                        covered += c.span(dir).length();
                                    }
                                }
                            }
                        }
                        let remaining = (r.span(dir).length() - covered).max(0) as f64;
                        if remaining == 0.0 {
                            continue;
                        }
                        let (Some(tn), Some(sn)) = (name_of(regions, kt), name_of(regions, ks))
                        else {
                            continue;
                        };
                        if tn != sn {
                            let (tn, sn) = (tn.clone(), sn.clone());
                            analysis.table.add(&tn, &sn, rule.cap * remaining);
                        }
                    }
                }
            }
        }
    }
}
