//! Core deterministic primitives.
//!
//! Seeded randomness, the vector type and state hashing. Everything the
//! simulation needs to be replayed bit-for-bit from a seed and an input tape.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
