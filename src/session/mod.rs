//! Session Shell
//!
//! The async layer around the deterministic core:
//! - Real-time tick driver with an input channel
//! - UI notices (JSON tagged)
//! - Leaderboard and reward collaborators
//!
//! Nothing in here feeds back into the simulation; collaborator failures
//! only ever become notices.

pub mod protocol;
pub mod leaderboard;
pub mod rewards;
pub mod runner;

// Re-export key types
pub use protocol::{Contact, Notice, PlayerSnapshot};
pub use leaderboard::{InMemoryLeaderboard, LeaderboardError, LeaderboardStore, ScoreEntry};
pub use rewards::{LedgerRewardClient, RewardClaim, RewardClient, RewardError, RewardReceipt};
pub use runner::{RunOutcome, RunSession, SessionConfig, SessionError};
