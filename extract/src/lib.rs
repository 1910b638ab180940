//! Hierarchical circuit extraction.
//!
//! This crate computes the parasitic adjustments a hierarchical layout
//! needs on top of the flat per-cell extractions of its children. Given
//! a [`db::Library`] of cell definitions and a [`tech::TechStyle`] rule
//! table, [`extract_hierarchical`] locates the places where subtrees
//! interact (come within a coupling halo of each other), flattens just
//! those areas, and emits incremental [`emit::Record`]s: `merge` records
//! joining nodes that connect across the hierarchy, `cap` records
//! adjusting coupling capacitance, and `subcap` records adjusting
//! substrate capacitance.
//!
//! Arrayed instances are handled without visiting every element: one
//! representative pair of adjacent elements is analyzed per direction,
//! and the resulting records carry ranged subscripts (`row[0:3]/a`)
//! applying to the whole array at once.
//!
//! Extraction is cooperative: pass a [`context::CancellationToken`] and
//! the engine stops at the next safe point, returning whatever records
//! it already produced along with counts of the work left undone.

#![warn(missing_docs)]

pub mod array;
pub mod context;
pub mod coupling;
pub mod db;
pub mod diagnostics;
pub mod emit;
pub mod hardway;
pub mod interact;
pub mod node;
pub mod region;
pub mod tech;
pub mod tile;
pub mod yank;

pub use context::{CancellationToken, ExtractOptions, ExtractionResult, ExtractionStats};
pub use db::{ArraySpec, CellDef, CellId, Instance, Label, LabelKind, Library};
pub use diagnostics::{Cause, ExtractionIssue, IssueSet, Severity};
pub use emit::{write_records, MergeDeltas, Record};
pub use interact::{extract_hierarchical, Extractor};
pub use tech::{PlaneId, TechStyle, TileTypeId};
