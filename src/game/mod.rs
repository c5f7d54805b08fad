//! Game Logic Module
//!
//! The gameplay simulation. Deterministic given a seed, a frame delta
//! sequence and an input sequence.
//!
//! ## Module Structure
//!
//! - `input`: Press edge detection, input tape
//! - `physics`: Player body integration
//! - `jump`: Coyote time and jump buffering
//! - `rail`: Rail attach / chain / detach
//! - `level`: Procedural spawning and difficulty ramp
//! - `combo`: Combo state machine and star payout
//! - `collision`: Hitboxes and obstacle hits
//! - `state`: Run state, score and stats
//! - `tick`: Per-frame orchestrator
//! - `events`: Game events for the UI and replays

pub mod input;
pub mod physics;
pub mod jump;
pub mod rail;
pub mod level;
pub mod combo;
pub mod collision;
pub mod state;
pub mod tick;
pub mod events;
pub mod error;

// Re-export key types
pub use input::{InputFrame, InputResolver, RunInputTape};
pub use physics::{MotionState, PlayerBody};
pub use jump::{JumpResolver, JumpState};
pub use rail::{RailId, RailSegment, RailTransition};
pub use level::{LevelDirector, ObstacleKind, ObstacleSpec};
pub use combo::{ComboEngine, ComboState, ComboStatus};
pub use state::{GameOverCause, RunId, RunPhase, RunState, RunStats, RunSummary};
pub use tick::{tick, replay_run, RunConfig, TickResult};
pub use events::{GameEvent, GameEventData};
pub use error::SimError;
