//! Session Messages
//!
//! What flows between the session and the rendering/UI layer. Notices are
//! serialized as tagged JSON so a browser front end can consume them as is.

use serde::{Serialize, Deserialize};

use crate::game::events::{GameEvent, GameEventData};
use crate::game::physics::MotionState;
use crate::game::state::{GameOverCause, RunState, RunStats};

// =============================================================================
// SESSION -> UI
// =============================================================================

/// Notifications for the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// Per-frame read view of the player.
    Snapshot(PlayerSnapshot),

    /// Rail caught; play the grind sound.
    GrindStarted,

    /// Combo turned active.
    ComboActivated {
        /// Starting multiplier.
        multiplier: u32,
    },

    /// Active combo changed.
    ComboUpdated {
        /// Current multiplier.
        multiplier: u32,
        /// Running distance.
        distance: u32,
    },

    /// Combo paid out.
    ComboEnded {
        /// Final multiplier.
        multiplier: u32,
        /// Final distance.
        distance: u32,
        /// Stars earned.
        stars_earned: u32,
    },

    /// Run over.
    GameOver {
        /// Distance plus stars.
        final_score: u64,
        /// Time survived (ms).
        survival_ms: u64,
        /// Collected counts.
        stats: RunStats,
        /// What ended it.
        cause: GameOverCause,
    },

    /// Score stored by the leaderboard.
    ScoreSubmitted {
        /// Leaderboard row id.
        entry_id: String,
        /// Score stored.
        score: u64,
    },

    /// Leaderboard rejected or could not store the score.
    ScoreSubmitFailed {
        /// Why.
        reason: String,
    },

    /// Reward claim settled.
    RewardSettled {
        /// Receiving account.
        account_id: String,
        /// Amount paid.
        amount: u64,
        /// Settlement receipt id.
        receipt_id: String,
    },

    /// Reward claim failed.
    RewardFailed {
        /// Receiving account.
        account_id: String,
        /// Amount requested.
        amount: u64,
        /// Why.
        reason: String,
    },

    /// The simulation stopped on a fatal error.
    SimulationError {
        /// Error text.
        reason: String,
    },
}

impl Notice {
    /// UI notice for a core event, if it has one.
    pub fn from_event(event: &GameEvent) -> Option<Self> {
        match &event.data {
            GameEventData::GrindStarted { .. } => Some(Notice::GrindStarted),
            GameEventData::ComboActivated { multiplier } => Some(Notice::ComboActivated {
                multiplier: *multiplier,
            }),
            GameEventData::ComboUpdated { multiplier, distance } => Some(Notice::ComboUpdated {
                multiplier: *multiplier,
                distance: *distance,
            }),
            GameEventData::ComboEnded { multiplier, distance, stars_earned } => Some(Notice::ComboEnded {
                multiplier: *multiplier,
                distance: *distance,
                stars_earned: *stars_earned,
            }),
            GameEventData::GameOver { final_score, survival_ms, stats, cause } => Some(Notice::GameOver {
                final_score: *final_score,
                survival_ms: *survival_ms,
                stats: *stats,
                cause: *cause,
            }),
            _ => None,
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Contact state as the front end sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contact {
    /// On the ground.
    Grounded,
    /// In the air.
    Airborne,
    /// Locked to a rail.
    Grinding,
}

impl From<MotionState> for Contact {
    fn from(motion: MotionState) -> Self {
        match motion {
            MotionState::Grounded => Contact::Grounded,
            MotionState::Airborne => Contact::Airborne,
            MotionState::Grinding { .. } => Contact::Grinding,
        }
    }
}

/// Player view sent every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Tick the snapshot was taken after.
    pub tick: u32,
    /// Feet position.
    pub position: [f32; 2],
    /// Velocity.
    pub velocity: [f32; 2],
    /// Contact state.
    pub contact: Contact,
    /// World speed.
    pub speed: f32,
    /// Score so far.
    pub score: u64,
}

impl PlayerSnapshot {
    /// Capture the current run state.
    pub fn capture(state: &RunState) -> Self {
        let body = &state.body;
        Self {
            tick: state.tick,
            position: [body.position.x, body.position.y],
            velocity: [body.velocity.x, body.velocity.y],
            contact: body.motion.into(),
            speed: state.speed,
            score: state.score(),
        }
    }
}
