//! Core primitives shared by every world component.
//!
//! Nothing in here knows about tiles or actors.

pub mod direction;
pub mod rng;
pub mod sync;

// Re-export core types
pub use direction::{Direction, Shape};
pub use rng::DeterministicRng;
