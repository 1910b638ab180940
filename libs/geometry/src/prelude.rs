//! A prelude re-exporting the most commonly used items.

pub use crate::dir::Dir;
pub use crate::point::Point;
pub use crate::rect::Rect;
pub use crate::side::Side;
pub use crate::span::Span;
pub use crate::transform::Transformation;
