//! Game Events
//!
//! Events generated during simulation for the UI layer, replay and logs.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::rail::{DetachReason, RailId};
use crate::game::state::{GameOverCause, RunStats};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Run end is handled first
    Terminal = 0,
    /// Combo payouts and state changes
    Combo = 1,
    /// Rail attach / chain / detach
    Rail = 2,
    /// Jumps, tricks, landings
    Movement = 3,
    /// Diagnostics
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A jump fired
    JumpExecuted {
        /// Where it left from
        position: Vec2,
        /// Rail it left, if it was grinding
        from_rail: Option<RailId>,
    },

    /// Automatic trick performed for the current airtime
    TrickPerformed {
        /// Player x
        x: f32,
    },

    /// Caught a rail. Doubles as the grind audio cue.
    GrindStarted {
        /// Rail handle
        rail: RailId,
    },

    /// Seamlessly moved onto the next segment
    GrindChained {
        /// Segment left
        from: RailId,
        /// Segment joined
        to: RailId,
    },

    /// Left a rail without jumping
    GrindEnded {
        /// Rail left
        rail: RailId,
        /// Why
        reason: DetachReason,
    },

    /// Touched the ground after airtime
    Landed {
        /// Player x
        x: f32,
    },

    /// Pending streak turned active
    ComboActivated {
        /// Starting multiplier
        multiplier: u32,
    },

    /// Active combo changed
    ComboUpdated {
        /// Current multiplier
        multiplier: u32,
        /// Running distance
        distance: u32,
    },

    /// Active combo paid out
    ComboEnded {
        /// Final multiplier
        multiplier: u32,
        /// Final distance
        distance: u32,
        /// Stars earned
        stars_earned: u32,
    },

    /// Pending streak dropped
    ComboDiscarded {
        /// Events the streak had collected
        air_events: u32,
    },

    /// Bad frame delta; integration skipped
    TimestepRejected {
        /// Offending delta (seconds)
        dt: f32,
    },

    /// Run ended
    GameOver {
        /// floor(distance) + stars
        final_score: u64,
        /// Survival time (ms)
        survival_ms: u64,
        /// Collected counts
        stats: RunStats,
        /// What ended it
        cause: GameOverCause,
    },
}

impl GameEventData {
    /// Event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameEventData::JumpExecuted { .. } => "jump_executed",
            GameEventData::TrickPerformed { .. } => "trick_performed",
            GameEventData::GrindStarted { .. } => "grind_started",
            GameEventData::GrindChained { .. } => "grind_chained",
            GameEventData::GrindEnded { .. } => "grind_ended",
            GameEventData::Landed { .. } => "landed",
            GameEventData::ComboActivated { .. } => "combo_activated",
            GameEventData::ComboUpdated { .. } => "combo_updated",
            GameEventData::ComboEnded { .. } => "combo_ended",
            GameEventData::ComboDiscarded { .. } => "combo_discarded",
            GameEventData::TimestepRejected { .. } => "timestep_rejected",
            GameEventData::GameOver { .. } => "game_over",
        }
    }

    fn priority(&self) -> EventPriority {
        match self {
            GameEventData::GameOver { .. } => EventPriority::Terminal,
            GameEventData::ComboActivated { .. }
            | GameEventData::ComboUpdated { .. }
            | GameEventData::ComboEnded { .. }
            | GameEventData::ComboDiscarded { .. } => EventPriority::Combo,
            GameEventData::GrindStarted { .. }
            | GameEventData::GrindChained { .. }
            | GameEventData::GrindEnded { .. } => EventPriority::Rail,
            GameEventData::JumpExecuted { .. }
            | GameEventData::TrickPerformed { .. }
            | GameEventData::Landed { .. } => EventPriority::Movement,
            GameEventData::TimestepRejected { .. } => EventPriority::Other,
        }
    }
}

/// A game event with timing and priority.
///
/// Consumers that process a batch in priority order sort by
/// `(tick, priority)`; equality compares the payload too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event; priority follows from the data.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self {
            tick,
            priority: data.priority(),
            data,
        }
    }

    /// Create jump executed event.
    pub fn jump_executed(tick: u32, position: Vec2, from_rail: Option<RailId>) -> Self {
        Self::new(tick, GameEventData::JumpExecuted { position, from_rail })
    }

    /// Create trick performed event.
    pub fn trick_performed(tick: u32, x: f32) -> Self {
        Self::new(tick, GameEventData::TrickPerformed { x })
    }

    /// Create landed event.
    pub fn landed(tick: u32, x: f32) -> Self {
        Self::new(tick, GameEventData::Landed { x })
    }

    /// Create timestep rejected event.
    pub fn timestep_rejected(tick: u32, dt: f32) -> Self {
        Self::new(tick, GameEventData::TimestepRejected { dt })
    }

    /// Create game over event.
    pub fn game_over(
        tick: u32,
        final_score: u64,
        survival_ms: u64,
        stats: RunStats,
        cause: GameOverCause,
    ) -> Self {
        Self::new(
            tick,
            GameEventData::GameOver {
                final_score,
                survival_ms,
                stats,
                cause,
            },
        )
    }
}
