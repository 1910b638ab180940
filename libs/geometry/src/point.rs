//! 2-D points.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;
use crate::transform::Transformation;

/// A point in two-dimensional space.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// The x-coordinate.
    pub x: i64,
    /// The y-coordinate.
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x, y) coordinates.
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, `(0, 0)`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Point::zero(), Point::new(0, 0));
    /// ```
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Gets the coordinate associated with direction `dir`.
    pub const fn coord(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.x,
            Dir::Vert => self.y,
        }
    }

    /// Returns this point translated by `p`.
    #[inline]
    pub const fn translate(self, p: Point) -> Self {
        Self::new(self.x + p.x, self.y + p.y)
    }

    /// Returns this point transformed by `trans`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let tf = Transformation::translate(10, -5);
    /// assert_eq!(Point::new(1, 2).transform(tf), Point::new(11, -3));
    /// ```
    pub fn transform(self, trans: Transformation) -> Self {
        trans.apply_point(self)
    }
}

impl From<(i64, i64)> for Point {
    #[inline]
    fn from(value: (i64, i64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        self.translate(rhs)
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let p = Point::new(3, -4) + Point::new(1, 1);
        assert_eq!(p, Point::new(4, -3));
        assert_eq!(p - Point::new(4, 0), Point::new(0, -3));
    }
}
