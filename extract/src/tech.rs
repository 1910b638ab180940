//! The technology style: the read-only rule table driving extraction.
//!
//! A [`TechStyle`] declares the planes of the process (with their physical
//! stacking order), the tile types that can appear on those planes, which
//! types are electrically connected, and the capacitance rules: substrate
//! capacitance per unit area and perimeter, overlap coupling between
//! planes, and sidewall coupling within a plane. It also carries the two
//! tuning distances used by the hierarchical extractor: the coupling halo
//! and the cookie-cutter chunk step size.

use std::collections::HashSet;
use std::fmt::Display;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An opaque plane identifier.
///
/// Plane IDs index into the [`TechStyle`] that created them and must not
/// be used with a different style.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PlaneId(usize);

impl PlaneId {
    /// The index of this plane in its technology style.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }

    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl Display for PlaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plane{}", self.0)
    }
}

/// An opaque tile-type identifier.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TileTypeId(usize);

impl TileTypeId {
    /// The index of this type in its technology style.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }
}

impl Display for TileTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type{}", self.0)
    }
}

/// A plane of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneInfo {
    /// The short name of the plane, used in generated node names.
    pub name: ArcStr,
    /// The physical stacking order; larger is farther from the substrate.
    ///
    /// Two planes may share an order, in which case neither is considered
    /// above the other and no overlap coupling is charged between them.
    pub order: i64,
}

/// A tile type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileTypeInfo {
    /// The name of the type.
    pub name: ArcStr,
    /// The home plane of the type.
    pub plane: PlaneId,
    /// Additional planes this type reaches through as a contact.
    pub contact_planes: Vec<PlaneId>,
    /// The resistance class perimeter/area totals are accumulated under.
    pub resist_class: usize,
    /// Capacitance to substrate per unit area.
    pub area_cap: f64,
    /// Capacitance to substrate per unit perimeter.
    pub perim_cap: f64,
}

/// An overlap coupling rule between a type and another type on a lower plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapRule {
    /// Coupling capacitance per unit overlap area.
    pub cap: f64,
    /// Types that shield this coupling when they intervene on a plane
    /// between the two coupled planes.
    pub shield_types: Vec<TileTypeId>,
}

/// A sidewall coupling rule between facing edges on the same plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SidewallRule {
    /// Coupling capacitance per unit common length at unit separation.
    ///
    /// The charged value is `cap * common_length / separation`.
    pub cap: f64,
}

/// A sidewall-overlap rule: coupling from a tile edge to a tile on another
/// plane overlapping the halo band beyond that edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidewallOverlapRule {
    /// Coupling capacitance per unit length of overlapped edge.
    pub cap: f64,
    /// Types that shield this coupling when they intervene between the
    /// two planes.
    pub shield_types: Vec<TileTypeId>,
}

/// The read-only technology rule table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechStyle {
    planes: Vec<PlaneInfo>,
    types: Vec<TileTypeInfo>,
    connects: HashSet<(TileTypeId, TileTypeId)>,
    cross_plane: HashSet<(TileTypeId, TileTypeId)>,
    overlap: IndexMap<(TileTypeId, TileTypeId), OverlapRule>,
    sidewall: IndexMap<(TileTypeId, TileTypeId), SidewallRule>,
    sidewall_overlap: IndexMap<(TileTypeId, TileTypeId), SidewallOverlapRule>,
    side_halo: i64,
    step_size: i64,
    scale: f64,
    num_resist_classes: usize,
}

impl TechStyle {
    /// Creates an empty style with a unit scale factor and a default
    /// chunk step size of 100 units.
    pub fn new() -> Self {
        Self {
            planes: Vec::new(),
            types: Vec::new(),
            connects: HashSet::new(),
            cross_plane: HashSet::new(),
            overlap: IndexMap::new(),
            sidewall: IndexMap::new(),
            sidewall_overlap: IndexMap::new(),
            side_halo: 0,
            step_size: 100,
            scale: 1.0,
            num_resist_classes: 0,
        }
    }

    /// Adds a plane with the given name and stacking order.
    pub fn add_plane(&mut self, name: impl Into<ArcStr>, order: i64) -> PlaneId {
        let id = PlaneId(self.planes.len());
        self.planes.push(PlaneInfo {
            name: name.into(),
            order,
        });
        id
    }

    /// Adds a tile type on the given plane.
    ///
    /// A type is always connected to itself.
    pub fn add_type(
        &mut self,
        name: impl Into<ArcStr>,
        plane: PlaneId,
        resist_class: usize,
        area_cap: f64,
        perim_cap: f64,
    ) -> TileTypeId {
        let id = TileTypeId(self.types.len());
        self.types.push(TileTypeInfo {
            name: name.into(),
            plane,
            contact_planes: Vec::new(),
            resist_class,
            area_cap,
            perim_cap,
        });
        self.connects.insert((id, id));
        self.num_resist_classes = self.num_resist_classes.max(resist_class + 1);
        id
    }

    /// Declares `ty` a contact reaching through to `plane`.
    pub fn add_contact_plane(&mut self, ty: TileTypeId, plane: PlaneId) {
        self.types[ty.0].contact_planes.push(plane);
    }

    /// Declares `a` and `b` electrically connected. Symmetric.
    pub fn connect(&mut self, a: TileTypeId, b: TileTypeId) {
        self.connects.insert((a, b));
        self.connects.insert((b, a));
    }

    /// Declares `a` and `b` connected across planes without a contact,
    /// e.g. identical doping types on adjacent planes. During region
    /// search, tiles of type `b` within a 1-unit halo of an `a` tile on
    /// another plane join the same region. Implies [`TechStyle::connect`].
    pub fn connect_across_planes(&mut self, a: TileTypeId, b: TileTypeId) {
        self.connect(a, b);
        self.cross_plane.insert((a, b));
        self.cross_plane.insert((b, a));
    }

    /// Adds an overlap coupling rule: `upper` over `lower` couples with
    /// `cap` per unit area, shielded by the given types.
    pub fn add_overlap(
        &mut self,
        upper: TileTypeId,
        lower: TileTypeId,
        cap: f64,
        shield_types: Vec<TileTypeId>,
    ) {
        self.overlap
            .insert((upper, lower), OverlapRule { cap, shield_types });
    }

    /// Adds a sidewall coupling rule between `a` edges and facing `b`
    /// edges on the same plane.
    ///
    /// Every edge matching the rule charges, so when `a` and `b` are the
    /// same type (or the rule is installed in both orders) each facing
    /// pair of edges is charged twice. Tables derived from measured
    /// edge-pair capacitance should carry half the measured value here.
    pub fn add_sidewall(&mut self, a: TileTypeId, b: TileTypeId, cap: f64) {
        self.sidewall.insert((a, b), SidewallRule { cap });
    }

    /// Adds a sidewall-overlap coupling rule from `a` edges to `b` tiles
    /// on another plane.
    pub fn add_sidewall_overlap(
        &mut self,
        a: TileTypeId,
        b: TileTypeId,
        cap: f64,
        shield_types: Vec<TileTypeId>,
    ) {
        self.sidewall_overlap
            .insert((a, b), SidewallOverlapRule { cap, shield_types });
    }

    /// Sets the sidewall coupling halo distance.
    pub fn set_side_halo(&mut self, halo: i64) {
        self.side_halo = halo;
    }

    /// Sets the cookie-cutter chunk step size.
    pub fn set_step_size(&mut self, step: i64) {
        self.step_size = step;
    }

    /// Sets the global scale divisor applied to emitted capacitances.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Returns `true` if the two types are declared connected.
    #[inline]
    pub fn connected(&self, a: TileTypeId, b: TileTypeId) -> bool {
        self.connects.contains(&(a, b))
    }

    /// Returns `true` if the two types connect across planes without a
    /// contact.
    #[inline]
    pub fn cross_plane_connected(&self, a: TileTypeId, b: TileTypeId) -> bool {
        self.cross_plane.contains(&(a, b))
    }

    /// Returns `true` if any cross-plane connection is declared for `ty`.
    pub fn has_cross_plane(&self, ty: TileTypeId) -> bool {
        self.cross_plane.iter().any(|&(a, _)| a == ty)
    }

    /// Information about the given plane.
    #[inline]
    pub fn plane(&self, id: PlaneId) -> &PlaneInfo {
        &self.planes[id.0]
    }

    /// The number of planes in the style.
    #[inline]
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// All plane IDs, in declaration order.
    pub fn plane_ids(&self) -> impl Iterator<Item = PlaneId> {
        (0..self.planes.len()).map(PlaneId)
    }

    /// Information about the given type.
    #[inline]
    pub fn type_info(&self, ty: TileTypeId) -> &TileTypeInfo {
        &self.types[ty.0]
    }

    /// The overlap rule for `upper` over `lower`, if declared.
    #[inline]
    pub fn overlap_rule(&self, upper: TileTypeId, lower: TileTypeId) -> Option<&OverlapRule> {
        self.overlap.get(&(upper, lower))
    }

    /// The sidewall rule for `a` facing `b`, if declared.
    #[inline]
    pub fn sidewall_rule(&self, a: TileTypeId, b: TileTypeId) -> Option<&SidewallRule> {
        self.sidewall.get(&(a, b))
    }

    /// The sidewall-overlap rule for `a` edges against `b` tiles, if
    /// declared.
    #[inline]
    pub fn sidewall_overlap_rule(
        &self,
        a: TileTypeId,
        b: TileTypeId,
    ) -> Option<&SidewallOverlapRule> {
        self.sidewall_overlap.get(&(a, b))
    }

    /// Returns `true` if any overlap or sidewall-overlap rule is declared
    /// for the style. Used to skip plane-pair scans entirely.
    pub fn has_overlap_rules(&self) -> bool {
        !self.overlap.is_empty() || !self.sidewall_overlap.is_empty()
    }

    /// Planes whose stacking order lies strictly between the orders of
    /// `upper` and `lower`, in declaration order.
    pub fn shield_planes(&self, upper: PlaneId, lower: PlaneId) -> impl Iterator<Item = PlaneId> + '_ {
        let hi = self.plane(upper).order.max(self.plane(lower).order);
        let lo = self.plane(upper).order.min(self.plane(lower).order);
        self.plane_ids()
            .filter(move |&p| self.plane(p).order > lo && self.plane(p).order < hi)
    }

    /// The sidewall coupling halo distance.
    #[inline]
    pub fn side_halo(&self) -> i64 {
        self.side_halo
    }

    /// The cookie-cutter chunk step size.
    #[inline]
    pub fn step_size(&self) -> i64 {
        self.step_size
    }

    /// The global scale divisor applied to emitted capacitances.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// One more than the largest declared resistance class.
    #[inline]
    pub fn num_resist_classes(&self) -> usize {
        self.num_resist_classes
    }
}
