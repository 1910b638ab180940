//! Output records.
//!
//! Each interaction area produces an ordered batch of incremental update
//! records: `merge` records joining nodes (the first record of a node's
//! chain carries the substrate-cap and perimeter/area adjustments),
//! `cap` records for node-pair coupling adjustments, and `subcap`
//! records for substrate-cap adjustments to nodes that were not merged
//! with anything. Capacitances are divided by the technology scale
//! before thresholding and emission.

use std::fmt::Display;
use std::io;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::coupling::CouplingTable;
use crate::node::{NodeTable, PerimArea};

/// The adjustments carried by the first merge record of a node's chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeDeltas {
    /// The substrate-capacitance adjustment, already scaled.
    pub cap: f64,
    /// Perimeter/area adjustments per resistance class.
    pub pa: Vec<PerimArea>,
}

impl MergeDeltas {
    /// Returns `true` if every component is negligible.
    pub fn is_zero(&self, epsilon: f64) -> bool {
        self.cap.abs() <= epsilon && self.pa.iter().all(|pa| pa.perim == 0 && pa.area == 0)
    }
}

/// One incremental update record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Record {
    /// Joins two nodes, optionally adjusting the merged node.
    Merge {
        /// The surviving node name.
        node1: ArcStr,
        /// The absorbed node name.
        node2: ArcStr,
        /// Adjustments, present only on the first record of a chain and
        /// only when some component is nonzero.
        deltas: Option<MergeDeltas>,
    },
    /// Adjusts the coupling capacitance between two nodes.
    Cap {
        /// The first node name.
        node1: ArcStr,
        /// The second node name.
        node2: ArcStr,
        /// The scaled coupling adjustment.
        value: f64,
    },
    /// Adjusts the substrate capacitance of a single node.
    Subcap {
        /// The node name.
        node: ArcStr,
        /// The scaled adjustment.
        value: f64,
    },
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge {
                node1,
                node2,
                deltas,
            } => {
                write!(f, "merge {node1} {node2}")?;
                if let Some(d) = deltas {
                    write!(f, " {}", d.cap)?;
                    for pa in &d.pa {
                        write!(f, " {} {}", pa.perim, pa.area)?;
                    }
                }
                Ok(())
            }
            Self::Cap {
                node1,
                node2,
                value,
            } => write!(f, "cap {node1} {node2} {value}"),
            Self::Subcap { node, value } => write!(f, "subcap {node} {value}"),
        }
    }
}

/// Emits the records for one interaction area in merge, cap, subcap
/// order. Node deltas and coupling values are divided by `scale`;
/// records whose every value is within `epsilon` of zero are suppressed.
pub fn emit(
    nodes: &NodeTable,
    coupling: &CouplingTable,
    scale: f64,
    epsilon: f64,
    out: &mut Vec<Record>,
) {
    for (_, node) in nodes.iter() {
        if node.aliases.len() < 2 {
            continue;
        }
        let deltas = MergeDeltas {
            cap: node.cap / scale,
            pa: node.pa.clone(),
        };
        let deltas = (!deltas.is_zero(epsilon)).then_some(deltas);
        let first = &node.aliases[0].name;
        for (i, alias) in node.aliases[1..].iter().enumerate() {
            out.push(Record::Merge {
                node1: first.clone(),
                node2: alias.name.clone(),
                deltas: if i == 0 { deltas.clone() } else { None },
            });
        }
    }

    for (pair, value) in coupling.iter() {
        let value = value / scale;
        if value.abs() > epsilon {
            out.push(Record::Cap {
                node1: pair.0.clone(),
                node2: pair.1.clone(),
                value,
            });
        }
    }

    for (_, node) in nodes.iter() {
        if node.aliases.len() != 1 {
            continue;
        }
        let value = node.cap / scale;
        if value.abs() > epsilon {
            out.push(Record::Subcap {
                node: node.name().clone(),
                value,
            });
        }
    }
}

/// Writes records one per line.
pub fn write_records<W: io::Write>(records: &[Record], mut w: W) -> io::Result<()> {
    for record in records {
        writeln!(w, "{record}")?;
    }
    Ok(())
}
