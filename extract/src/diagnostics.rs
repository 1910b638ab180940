//! Diagnostics reported during extraction.
//!
//! Extraction never hard-aborts: problems are recorded as issues with a
//! severity and an annotation rectangle, the engine keeps going, and the
//! caller decides what to do with the error and warning counts.

use std::fmt::Display;

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

/// An enumeration of possible severity levels.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// A fatal extraction error. Processing continues, but the output
    /// is suspect.
    Error,
}

impl Severity {
    /// Returns the log level corresponding to this severity.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The cause of an extraction issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// Two overlapping tiles whose types are not declared connected.
    IllegalOverlap {
        /// The overlap area.
        area: Rect,
        /// The name of the plane the overlap occurred on.
        plane: ArcStr,
        /// The name of the first type.
        type_a: ArcStr,
        /// The name of the second type.
        type_b: ArcStr,
    },
    /// The hard-way search exhausted the subtree without finding a label.
    UnresolvableName {
        /// The area searched.
        area: Rect,
        /// The name of the plane searched.
        plane: ArcStr,
    },
    /// An array interaction expected exactly one primary element and
    /// found none.
    MissingPrimary {
        /// The name of the arrayed instance.
        instance: ArcStr,
        /// The interaction area that was abandoned.
        area: Rect,
    },
    /// No label was found for a node, so a name was generated from its
    /// lowest-leftmost geometry.
    GeneratedName {
        /// The generated name.
        name: ArcStr,
        /// The anchor area of the region.
        area: Rect,
    },
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalOverlap {
                area,
                plane,
                type_a,
                type_b,
            } => write!(
                f,
                "types `{type_a}` and `{type_b}` overlap on plane {plane} at {area:?} but are not connected"
            ),
            Self::UnresolvableName { area, plane } => write!(
                f,
                "cannot find the name of the node on plane {plane} at {area:?}"
            ),
            Self::MissingPrimary { instance, area } => write!(
                f,
                "array `{instance}`: no primary element found; skipping interaction at {area:?}"
            ),
            Self::GeneratedName { name, area } => {
                write!(f, "no label for node at {area:?}; generated name `{name}`")
            }
        }
    }
}

/// An issue identified while extracting a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionIssue {
    cause: Cause,
    severity: Severity,
}

impl ExtractionIssue {
    /// Creates a new issue, inferring the severity from the cause.
    pub fn new(cause: Cause) -> Self {
        let severity = match cause {
            Cause::GeneratedName { .. } => Severity::Warning,
            _ => Severity::Error,
        };
        Self { cause, severity }
    }

    /// The cause of the issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// The severity of the issue.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for ExtractionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.cause)
    }
}

/// A collection of extraction issues with error and warning counts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IssueSet {
    issues: Vec<ExtractionIssue>,
    num_errors: usize,
    num_warnings: usize,
}

impl IssueSet {
    /// Creates a new, empty issue set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an issue to the set, logging it at its severity level.
    pub fn add(&mut self, issue: ExtractionIssue) {
        match issue.severity() {
            Severity::Error => {
                tracing::error!("{issue}");
                self.num_errors += 1;
            }
            Severity::Warning => {
                tracing::warn!("{issue}");
                self.num_warnings += 1;
            }
            Severity::Info => tracing::info!("{issue}"),
        }
        self.issues.push(issue);
    }

    /// Records a cause, inferring its severity.
    pub fn record(&mut self, cause: Cause) {
        self.add(ExtractionIssue::new(cause));
    }

    /// Returns an iterator over all issues in the set.
    pub fn iter(&self) -> impl Iterator<Item = &ExtractionIssue> {
        self.issues.iter()
    }

    /// The number of issues in the set.
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// The number of fatal errors in the set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// The number of warnings in the set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Returns `true` if the set contains a fatal error.
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }
}

impl Display for IssueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{issue}")?;
        }
        Ok(())
    }
}
