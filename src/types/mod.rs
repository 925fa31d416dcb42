//! Shared types used throughout the library.

mod direction;
mod transform;

pub use direction::{Axis, Direction};
pub use transform::ElementRotation;
