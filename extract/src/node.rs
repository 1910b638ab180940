//! The node registry: canonical electrical nets for one interaction area.
//!
//! Nodes live in an arena keyed by stable [`NodeId`]s; every textual
//! alias maps to exactly one node through the registry's name table.
//! Merging two nodes splices the absorbed node's alias list onto the
//! survivor and repoints the name table, so no alias is ever left
//! dangling. Registry contents live only for one interaction area.

use std::fmt::Display;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tech::{PlaneId, TechStyle};

/// An opaque node identifier, stable for the lifetime of one
/// interaction area.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(u64);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// A perimeter/area pair accumulated for one resistance class.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PerimArea {
    /// Total perimeter.
    pub perim: i64,
    /// Total area.
    pub area: i64,
}

/// One textual alias of a node.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeAlias {
    /// The alias text.
    pub name: ArcStr,
    /// Whether the alias was generated rather than read from a label.
    pub generated: bool,
}

/// A node's aliases and aggregate deltas.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Aliases in discovery order. Never empty for a registered node.
    pub aliases: Vec<NodeAlias>,
    /// Accumulated substrate-capacitance delta.
    pub cap: f64,
    /// Accumulated perimeter/area deltas per resistance class.
    pub pa: Vec<PerimArea>,
}

impl NodeData {
    /// The node's first alias.
    pub fn name(&self) -> &ArcStr {
        &self.aliases[0].name
    }

    /// Returns `true` if any delta is nonzero.
    pub fn has_deltas(&self) -> bool {
        self.cap != 0.0 || self.pa.iter().any(|pa| pa.perim != 0 || pa.area != 0)
    }
}

/// A name resolved for a region, with its provenance.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolvedName {
    /// The node name.
    pub name: ArcStr,
    /// Whether the name was generated rather than read from a label.
    pub generated: bool,
}

/// The name-to-node registry for one interaction area.
#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    node_id: u64,
    nodes: IndexMap<NodeId, NodeData>,
    names: IndexMap<ArcStr, NodeId>,
    num_classes: usize,
}

impl NodeTable {
    /// Creates an empty registry accumulating the given number of
    /// resistance classes.
    pub fn new(num_classes: usize) -> Self {
        Self {
            node_id: 0,
            nodes: IndexMap::new(),
            names: IndexMap::new(),
            num_classes,
        }
    }

    /// Looks up `name`, creating a singleton node for it if absent.
    pub fn resolve_or_create(&mut self, name: &ArcStr, generated: bool) -> NodeId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        self.node_id += 1;
        let id = NodeId(self.node_id);
        self.nodes.insert(
            id,
            NodeData {
                aliases: vec![NodeAlias {
                    name: name.clone(),
                    generated,
                }],
                cap: 0.0,
                pa: vec![PerimArea::default(); self.num_classes],
            },
        );
        self.names.insert(name.clone(), id);
        id
    }

    /// The node a name currently maps to, if any.
    pub fn node_of(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// The data for a node.
    ///
    /// # Panics
    ///
    /// Panics if the ID has been absorbed by a merge or never existed.
    pub fn node(&self, id: NodeId) -> &NodeData {
        self.nodes.get(&id).expect("invalid or absorbed node ID")
    }

    /// Merges `absorb` into `keep`: splices the alias list, repoints
    /// every absorbed alias to `keep`, sums the deltas, and discards the
    /// absorbed node. A no-op if the two IDs are identical.
    pub fn merge(&mut self, keep: NodeId, absorb: NodeId) {
        if keep == absorb {
            return;
        }
        let absorbed = self.nodes.shift_remove(&absorb).expect("invalid node ID");
        for alias in &absorbed.aliases {
            self.names.insert(alias.name.clone(), keep);
        }
        let node = self.nodes.get_mut(&keep).expect("invalid node ID");
        node.aliases.extend(absorbed.aliases);
        node.cap += absorbed.cap;
        for (acc, pa) in node.pa.iter_mut().zip(absorbed.pa) {
            acc.perim += pa.perim;
            acc.area += pa.area;
        }
    }

    /// Adds a substrate-capacitance delta to a node.
    pub fn add_cap(&mut self, id: NodeId, delta: f64) {
        self.nodes.get_mut(&id).expect("invalid node ID").cap += delta;
    }

    /// Adds a perimeter/area delta for one resistance class.
    pub fn add_perim_area(&mut self, id: NodeId, class: usize, perim: i64, area: i64) {
        let pa = &mut self.nodes.get_mut(&id).expect("invalid node ID").pa[class];
        pa.perim += perim;
        pa.area += area;
    }

    /// Iterates over live nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter().map(|(id, data)| (*id, data))
    }

    /// The number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the registry holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clears all nodes and names, keeping the class count.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.names.clear();
    }
}

/// Synthesizes the deterministic name for an unlabeled node from its
/// lowest plane and lowest-leftmost point. Negative coordinates are
/// written with an `n` prefix.
///
/// # Example
///
/// ```
/// # use extract::tech::TechStyle;
/// # use extract::node::generated_name;
/// # use geometry::prelude::*;
/// let mut tech = TechStyle::new();
/// let metal1 = tech.add_plane("metal1", 1);
/// assert_eq!(generated_name(&tech, metal1, Point::new(3, -7)), "metal1_3_n7#");
/// ```
pub fn generated_name(tech: &TechStyle, plane: PlaneId, ll: Point) -> ArcStr {
    fn coord(v: i64) -> String {
        if v < 0 {
            format!("n{}", -v)
        } else {
            v.to_string()
        }
    }
    arcstr::format!("{}_{}_{}#", tech.plane(plane).name, coord(ll.x), coord(ll.y))
}
