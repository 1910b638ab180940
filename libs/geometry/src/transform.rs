//! Manhattan transformations: rotation, reflection, and translation.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A Manhattan rotation: 0, 90, 180, or 270 degrees counterclockwise.
#[derive(Debug, Clone, Copy, Default, Eq, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub enum Rotation {
    /// 0 degrees; no rotation.
    #[default]
    R0,
    /// 90 degrees counterclockwise.
    R90,
    /// 180 degrees counterclockwise.
    R180,
    /// 270 degrees counterclockwise.
    R270,
}

/// A transformation representing a Manhattan translation, rotation,
/// and/or reflection of geometry.
///
/// The transformation maps a point `p` to `mat * p + ofs`. All matrices
/// are unitary: scaling is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    /// The transformation matrix, row-major. Entries are -1, 0, or 1.
    mat: [[i64; 2]; 2],
    /// The x-y translation applied after the matrix.
    ofs: Point,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// The identity transformation.
    pub const fn identity() -> Self {
        Self {
            mat: [[1, 0], [0, 1]],
            ofs: Point::zero(),
        }
    }

    /// A pure translation by `(x, y)`.
    pub const fn translate(x: i64, y: i64) -> Self {
        Self {
            mat: [[1, 0], [0, 1]],
            ofs: Point::new(x, y),
        }
    }

    /// A counterclockwise rotation about the origin.
    pub const fn rotate(rotation: Rotation) -> Self {
        let mat = match rotation {
            Rotation::R0 => [[1, 0], [0, 1]],
            Rotation::R90 => [[0, -1], [1, 0]],
            Rotation::R180 => [[-1, 0], [0, -1]],
            Rotation::R270 => [[0, 1], [-1, 0]],
        };
        Self {
            mat,
            ofs: Point::zero(),
        }
    }

    /// A reflection across the x-axis (flips the y-coordinate).
    pub const fn reflect_vert() -> Self {
        Self {
            mat: [[1, 0], [0, -1]],
            ofs: Point::zero(),
        }
    }

    /// Returns the transformation equivalent to applying `first`, then
    /// `second`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// # use geometry::transform::Rotation;
    /// let tf = Transformation::cascade(
    ///     Transformation::rotate(Rotation::R90),
    ///     Transformation::translate(10, 0),
    /// );
    /// assert_eq!(tf.apply_point(Point::new(2, 0)), Point::new(10, 2));
    /// ```
    pub fn cascade(first: Self, second: Self) -> Self {
        let m1 = first.mat;
        let m2 = second.mat;
        let mut mat = [[0i64; 2]; 2];
        for (i, row) in mat.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                *entry = m2[i][0] * m1[0][j] + m2[i][1] * m1[1][j];
            }
        }
        Self {
            mat,
            ofs: second.apply_point(first.ofs),
        }
    }

    /// Returns the inverse of this transformation.
    ///
    /// Manhattan matrices are orthogonal, so the inverse matrix is the
    /// transpose.
    pub fn inv(&self) -> Self {
        let m = self.mat;
        let inv = [[m[0][0], m[1][0]], [m[0][1], m[1][1]]];
        let b = Point::new(
            -(inv[0][0] * self.ofs.x + inv[0][1] * self.ofs.y),
            -(inv[1][0] * self.ofs.x + inv[1][1] * self.ofs.y),
        );
        Self { mat: inv, ofs: b }
    }

    /// Applies this transformation to a point.
    pub fn apply_point(&self, p: Point) -> Point {
        Point::new(
            self.mat[0][0] * p.x + self.mat[0][1] * p.y + self.ofs.x,
            self.mat[1][0] * p.x + self.mat[1][1] * p.y + self.ofs.y,
        )
    }

    /// Returns this transformation followed by a translation by `(x, y)`.
    pub fn translated(self, x: i64, y: i64) -> Self {
        Self::cascade(self, Self::translate(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_then_invert_is_identity() {
        let tf = Transformation::cascade(
            Transformation::rotate(Rotation::R270),
            Transformation::translate(-3, 11),
        );
        let inv = tf.inv();
        for p in [Point::new(0, 0), Point::new(5, -7), Point::new(-2, 9)] {
            assert_eq!(inv.apply_point(tf.apply_point(p)), p);
        }
    }

    #[test]
    fn reflection_composes() {
        let tf = Transformation::cascade(
            Transformation::reflect_vert(),
            Transformation::rotate(Rotation::R180),
        );
        assert_eq!(tf.apply_point(Point::new(1, 2)), Point::new(-1, 2));
    }
}
