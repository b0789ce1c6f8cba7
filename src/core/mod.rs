//! Core deterministic primitives.
//!
//! Fixed-point scalars and vectors, the seeded RNG and state hashing. The
//! game layer builds on these so that a round is reproducible from its
//! seed and input log.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::{StateHash, compute_state_hash};
