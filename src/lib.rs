//! # Rail Runner
//!
//! Deterministic gameplay core for Rail Runner, an endless side-scrolling
//! runner built around jumps, rail grinds and combo multipliers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       RAIL RUNNER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── input.rs    - Press edges and input tape                │
//! │  ├── physics.rs  - Player body                               │
//! │  ├── jump.rs     - Coyote time and jump buffer               │
//! │  ├── rail.rs     - Rail attach / chain / detach              │
//! │  ├── level.rs    - Procedural spawning, difficulty ramp      │
//! │  ├── combo.rs    - Combo multiplier and star payout          │
//! │  └── tick.rs     - Per-frame simulation loop                 │
//! │                                                              │
//! │  replay/         - Transcripts and replay verification       │
//! │                                                              │
//! │  session/        - Async shell (non-deterministic)           │
//! │  ├── runner.rs   - Real-time tick driver                     │
//! │  ├── protocol.rs - UI notices                                │
//! │  └── ...         - Leaderboard and reward collaborators      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given the same seed, config, frame delta sequence and input sequence,
//! `core/` and `game/` produce the same state hash:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+
//! - Fixed 16 ms sub-ticks for the jump counters
//!
//! Physics runs in `f32`, so replays are bit-exact on the same build and
//! platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod replay;
pub mod session;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::{derive_run_seed, DeterministicRng};
pub use game::input::{InputDelta, InputFrame, RunInputTape};
pub use game::state::{RunId, RunState, RunSummary};
pub use game::tick::{tick, RunConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
