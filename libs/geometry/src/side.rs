//! The sides of an axis-aligned rectangle.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;

/// An enumeration of the sides of an axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum Side {
    /// The left side.
    Left,
    /// The bottom side.
    Bot,
    /// The right side.
    Right,
    /// The top side.
    Top,
}

impl Side {
    /// All four sides, in enumeration order.
    pub const ALL: [Side; 4] = [Side::Left, Side::Bot, Side::Right, Side::Top];

    /// The direction along which the side's edge runs.
    ///
    /// The left and right sides run vertically; the top and bottom sides
    /// run horizontally.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Side::Left.edge_dir(), Dir::Vert);
    /// assert_eq!(Side::Top.edge_dir(), Dir::Horiz);
    /// ```
    pub const fn edge_dir(&self) -> Dir {
        match self {
            Side::Left | Side::Right => Dir::Vert,
            Side::Top | Side::Bot => Dir::Horiz,
        }
    }

    /// The outward normal direction of the side: `+1` for top/right,
    /// `-1` for bottom/left.
    pub const fn sign(&self) -> i64 {
        match self {
            Side::Top | Side::Right => 1,
            Side::Bot | Side::Left => -1,
        }
    }

    /// The opposite side.
    pub const fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bot,
            Side::Bot => Side::Top,
        }
    }
}
