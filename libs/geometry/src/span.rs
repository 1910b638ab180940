//! One-dimensional closed intervals.

use serde::{Deserialize, Serialize};

/// A closed interval of coordinates in one dimension.
///
/// Represents the range `[start, stop]`.
#[derive(
    Debug, Default, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq,
)]
pub struct Span {
    start: i64,
    stop: i64,
}

impl Span {
    /// Creates a new [`Span`] between two integers, sorting them if necessary.
    pub fn new(start: i64, stop: i64) -> Self {
        Self {
            start: start.min(stop),
            stop: start.max(stop),
        }
    }

    /// The lower bound of the span.
    #[inline]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// The upper bound of the span.
    #[inline]
    pub const fn stop(&self) -> i64 {
        self.stop
    }

    /// The length of the span.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Span::new(4, 10).length(), 6);
    /// ```
    #[inline]
    pub const fn length(&self) -> i64 {
        self.stop - self.start
    }

    /// The intersection of two spans, or [`None`] if they do not overlap.
    ///
    /// Spans sharing only an endpoint intersect in a zero-length span.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        (start <= stop).then_some(Self { start, stop })
    }

    /// The minimal span covering both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    /// Returns `true` if the span contains the given coordinate.
    #[inline]
    pub const fn contains(&self, x: i64) -> bool {
        self.start <= x && x <= self.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_intersection() {
        let a = Span::new(0, 10);
        let b = Span::new(5, 20);
        assert_eq!(a.intersection(b), Some(Span::new(5, 10)));
        assert_eq!(a.intersection(Span::new(10, 12)), Some(Span::new(10, 10)));
        assert_eq!(a.intersection(Span::new(11, 12)), None);
    }

    #[test]
    fn span_union() {
        assert_eq!(Span::new(0, 3).union(Span::new(7, 9)), Span::new(0, 9));
    }
}
