//! Explicit per-extraction state: options, cancellation, statistics, and
//! the per-interaction-area scratch context.
//!
//! The original formulation of this engine kept the current interaction
//! in process-wide globals; here that state is an [`InteractionContext`]
//! threaded through every call, so independent extractions cannot
//! interfere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::coupling::CouplingTable;
use crate::diagnostics::IssueSet;
use crate::emit::Record;
use crate::node::NodeTable;

/// A cooperative cancellation token.
///
/// The engine polls the token at bounded intervals (once per flood-fill
/// pop, once per array element, once per chunk) and stops at the next
/// safe point when it is set. Cancellation is not an error: the engine
/// cleans up and returns whatever records were already emitted.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Options controlling one extraction run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Overrides the technology's capacitance scale divisor.
    pub scale: Option<f64>,
    /// Values whose scaled magnitude does not exceed this threshold are
    /// suppressed from the output.
    pub epsilon: f64,
    /// Overrides the technology's cookie-cutter chunk step size.
    pub step_size: Option<i64>,
    /// Overrides the technology's sidewall coupling halo.
    pub side_halo: Option<i64>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scale: None,
            epsilon: 1e-9,
            step_size: None,
            side_halo: None,
        }
    }
}

/// Statistics accumulated over one extraction run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Chunks examined by the interaction locator.
    pub chunks: usize,
    /// Chunks skipped because no interaction was found.
    pub chunks_skipped: usize,
    /// Interaction areas fully processed.
    pub interactions: usize,
    /// Tiles visited by the region finder.
    pub tiles_visited: usize,
    /// Chunks and array zones left unprocessed due to cancellation.
    pub unfinished: usize,
    /// Whether the run was cancelled before completion.
    pub cancelled: bool,
}

/// The result of one extraction run: best-effort output plus counts.
#[derive(Clone, Debug, Default)]
pub struct ExtractionResult {
    /// Update records, in emission order.
    pub records: Vec<Record>,
    /// Diagnostics recorded during the run.
    pub issues: IssueSet,
    /// Run statistics.
    pub stats: ExtractionStats,
}

/// Scratch state for one interaction area, fully discarded once the
/// area's records are written.
#[derive(Debug, Default)]
pub struct InteractionContext {
    /// The interaction area: geometry within it participates in
    /// cross-instance analysis.
    pub area: Rect,
    /// The clip area: the portion whose perimeter/area contributions are
    /// charged to this interaction, to avoid double counting across
    /// adjacent chunks.
    pub clip: Rect,
    /// The live name-to-node registry.
    pub nodes: NodeTable,
    /// Net coupling deltas for this interaction.
    pub coupling: CouplingTable,
    /// Net substrate-capacitance adjustments keyed by node name.
    pub substrate: IndexMap<ArcStr, f64>,
}

impl InteractionContext {
    /// Creates a context for one interaction area.
    pub fn new(area: Rect, clip: Rect, num_classes: usize) -> Self {
        Self {
            area,
            clip,
            nodes: NodeTable::new(num_classes),
            coupling: CouplingTable::new(),
            substrate: IndexMap::new(),
        }
    }
}
