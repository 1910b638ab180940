//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;
use crate::point::Point;
use crate::side::Side;
use crate::span::Span;
use crate::transform::Transformation;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle from two corner points, sorting coordinates so
    /// that `p0` is the lower-left corner and `p1` the upper-right.
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(15, 20, 30, 40);
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.bot(), 20);
    /// assert_eq!(rect.right(), 30);
    /// assert_eq!(rect.top(), 40);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `left > right` or `bot > top`.
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires left ({left}) <= right ({right})"
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires bot ({bot}) <= top ({top})"
        );
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a rectangle from all 4 sides, returning [`None`] if the
    /// sides would make the rectangle empty.
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        (left <= right && bot <= top).then(|| Self::from_sides(left, bot, right, top))
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// Creates a rectangle from a horizontal and a vertical span.
    pub fn from_spans(h: Span, v: Span) -> Self {
        Self {
            p0: Point::new(h.start(), v.start()),
            p1: Point::new(h.stop(), v.stop()),
        }
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// The x-coordinate of the left edge.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The y-coordinate of the bottom edge.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The x-coordinate of the right edge.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The y-coordinate of the top edge.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The width of the rectangle.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The height of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The area of the rectangle.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Rect::from_sides(0, 0, 4, 5).area(), 20);
    /// ```
    #[inline]
    pub const fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Returns `true` if the rectangle encloses zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// The span of the rectangle along direction `dir`.
    pub fn span(&self, dir: Dir) -> Span {
        match dir {
            Dir::Horiz => Span::new(self.p0.x, self.p1.x),
            Dir::Vert => Span::new(self.p0.y, self.p1.y),
        }
    }

    /// The coordinate of the given side.
    pub const fn side_coord(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.p0.x,
            Side::Bot => self.p0.y,
            Side::Right => self.p1.x,
            Side::Top => self.p1.y,
        }
    }

    /// The span of the edge on the given side.
    ///
    /// Left/right edges span vertically; top/bottom edges span horizontally.
    pub fn side_span(&self, side: Side) -> Span {
        self.span(side.edge_dir())
    }

    /// Returns `true` if the rectangle contains the given point
    /// (boundary inclusive).
    pub const fn contains(&self, p: Point) -> bool {
        self.p0.x <= p.x && p.x <= self.p1.x && self.p0.y <= p.y && p.y <= self.p1.y
    }

    /// The intersection of two rectangles, or [`None`] if they are disjoint.
    ///
    /// Rectangles that share only an edge or corner intersect in an empty
    /// rectangle.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// let b = Rect::from_sides(5, 5, 20, 20);
    /// assert_eq!(a.intersection(b), Some(Rect::from_sides(5, 5, 10, 10)));
    /// ```
    pub fn intersection(self, other: Self) -> Option<Self> {
        Self::from_sides_option(
            self.left().max(other.left()),
            self.bot().max(other.bot()),
            self.right().min(other.right()),
            self.top().min(other.top()),
        )
    }

    /// Returns `true` if the two rectangles overlap in nonzero area.
    pub fn overlaps(self, other: Self) -> bool {
        self.intersection(other).is_some_and(|r| !r.is_empty())
    }

    /// Returns `true` if the two rectangles overlap or abut.
    pub fn touches(self, other: Self) -> bool {
        self.intersection(other).is_some()
    }

    /// The minimal rectangle covering both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            p0: Point::new(self.left().min(other.left()), self.bot().min(other.bot())),
            p1: Point::new(self.right().max(other.right()), self.top().max(other.top())),
        }
    }

    /// Grows the rectangle by `amount` on all four sides.
    ///
    /// Negative amounts shrink the rectangle; shrinking an already-small
    /// rectangle panics.
    pub fn expand_all(self, amount: i64) -> Self {
        Self::from_sides(
            self.left() - amount,
            self.bot() - amount,
            self.right() + amount,
            self.top() + amount,
        )
    }

    /// Grows the rectangle by `amount` on the given side only.
    pub fn expand_side(self, side: Side, amount: i64) -> Self {
        match side {
            Side::Left => Self::from_sides(self.left() - amount, self.bot(), self.right(), self.top()),
            Side::Bot => Self::from_sides(self.left(), self.bot() - amount, self.right(), self.top()),
            Side::Right => {
                Self::from_sides(self.left(), self.bot(), self.right() + amount, self.top())
            }
            Side::Top => Self::from_sides(self.left(), self.bot(), self.right(), self.top() + amount),
        }
    }

    /// Returns this rectangle translated by `p`.
    pub fn translate(self, p: Point) -> Self {
        Self {
            p0: self.p0.translate(p),
            p1: self.p1.translate(p),
        }
    }

    /// Returns this rectangle transformed by `trans`.
    ///
    /// Rotations and reflections swap corners as needed; the result is
    /// re-normalized so that `p0` remains the lower-left corner.
    pub fn transform(self, trans: Transformation) -> Self {
        Self::new(trans.apply_point(self.p0), trans.apply_point(self.p1))
    }
}
