//! Integer geometry primitives for layout processing.
//!
//! Coordinates are `i64` lambda units. Rectangles are axis-aligned and
//! closed on all sides; transformations are Manhattan (rotations by
//! multiples of 90 degrees, reflections, and translations).
#![warn(missing_docs)]

pub mod dir;
pub mod point;
pub mod prelude;
pub mod rect;
pub mod side;
pub mod span;
pub mod transform;
