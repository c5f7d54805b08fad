//! Combo / Scoring Engine
//!
//! ```text
//!  Inactive ──1st air event──▶ Pending ──Nth air event──▶ Active
//!     ▲                           │                          │
//!     └──── landing / timeout ────┘                          │
//!     └──────────── landing: stars = distance × multiplier ──┘
//! ```
//!
//! The engine never caps the multiplier.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::StateHasher;

/// Tuning for combos.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// Air events needed to turn a pending streak active
    pub activation_events: u32,
    /// Multiplier when a combo turns active
    pub base_multiplier: u32,
    /// Window armed by a rail attach (ms)
    pub timeout_ms: f32,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            activation_events: 3,
            base_multiplier: 3,
            timeout_ms: 3000.0,
        }
    }
}

/// Combo lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboStatus {
    /// No streak
    #[default]
    Inactive,
    /// Streak started, not yet paying
    Pending,
    /// Multiplier live
    Active,
}

/// Scoring events that can only count while airborne.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirEvent {
    /// Automatic trick, once per airtime
    Trick,
    /// Caught a rail
    RailGrind,
}

/// Combo bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboState {
    /// Lifecycle
    pub status: ComboStatus,
    /// Events in the current streak
    pub air_event_count: u32,
    /// Meaningful only while active
    pub multiplier: u32,
    /// X where the streak began
    pub start_x: f32,
    /// floor(current x - start x)
    pub combo_distance: u32,
    /// Remaining rail timeout window (ms); zero when unarmed
    pub timeout_ms: f32,
}

/// Notifications for the rendering/UI collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboNotice {
    /// Streak turned active
    Activated {
        /// Starting multiplier
        multiplier: u32,
    },
    /// Multiplier or distance changed
    Updated {
        /// Current multiplier
        multiplier: u32,
        /// Running distance
        distance: u32,
    },
    /// Active combo paid out on landing
    Ended {
        /// Final multiplier
        multiplier: u32,
        /// Final distance
        distance: u32,
        /// distance × multiplier
        stars_earned: u32,
    },
    /// Pending streak dropped without payout
    Discarded {
        /// Events the streak had collected
        air_events: u32,
    },
}

/// The combo state machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComboEngine {
    config: ComboConfig,
    state: ComboState,
}

impl ComboEngine {
    /// Create an inactive engine.
    pub fn new(config: ComboConfig) -> Self {
        Self {
            config,
            state: ComboState::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &ComboState {
        &self.state
    }

    /// Register an air event at `x`.
    ///
    /// Events while grounded are dropped.
    pub fn register(&mut self, event: AirEvent, airborne: bool, x: f32) -> Option<ComboNotice> {
        if !airborne {
            debug!(?event, "combo event discarded while grounded");
            return None;
        }

        match self.state.status {
            ComboStatus::Inactive => {
                self.state = ComboState {
                    status: ComboStatus::Pending,
                    air_event_count: 1,
                    multiplier: 0,
                    start_x: x,
                    combo_distance: 0,
                    timeout_ms: self.state.timeout_ms,
                };
                self.try_activate()
            }
            ComboStatus::Pending => {
                self.state.air_event_count += 1;
                self.try_activate()
            }
            ComboStatus::Active => {
                self.state.air_event_count += 1;
                self.state.multiplier = self.state.multiplier.saturating_add(1);
                self.state.combo_distance = distance_between(self.state.start_x, x);
                Some(ComboNotice::Updated {
                    multiplier: self.state.multiplier,
                    distance: self.state.combo_distance,
                })
            }
        }
    }

    fn try_activate(&mut self) -> Option<ComboNotice> {
        if self.state.air_event_count < self.config.activation_events {
            return None;
        }
        self.state.status = ComboStatus::Active;
        self.state.multiplier = self.config.base_multiplier;
        Some(ComboNotice::Activated {
            multiplier: self.state.multiplier,
        })
    }

    /// Start or extend the timeout window.
    pub fn arm_timeout(&mut self) {
        self.state.timeout_ms = self.config.timeout_ms;
    }

    /// Per-frame update while the run continues.
    ///
    /// A pending streak whose window lapses is dropped. An active combo
    /// reports its running distance every frame.
    pub fn on_frame(&mut self, x: f32, elapsed_ms: f32) -> Option<ComboNotice> {
        if self.state.timeout_ms > 0.0 && elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            self.state.timeout_ms = (self.state.timeout_ms - elapsed_ms).max(0.0);
            if self.state.timeout_ms == 0.0 && self.state.status == ComboStatus::Pending {
                let air_events = self.state.air_event_count;
                debug!(air_events, "pending combo timed out");
                self.reset();
                return Some(ComboNotice::Discarded { air_events });
            }
        }

        if self.state.status != ComboStatus::Active {
            return None;
        }

        self.state.combo_distance = distance_between(self.state.start_x, x);
        Some(ComboNotice::Updated {
            multiplier: self.state.multiplier,
            distance: self.state.combo_distance,
        })
    }

    /// Resolve the streak on touching the ground.
    ///
    /// Only an active combo pays; a pending one is dropped.
    pub fn on_landing(&mut self, x: f32) -> Option<ComboNotice> {
        match self.state.status {
            ComboStatus::Inactive => None,
            ComboStatus::Pending => {
                let air_events = self.state.air_event_count;
                debug!(air_events, "pending combo dropped on landing");
                self.reset();
                Some(ComboNotice::Discarded { air_events })
            }
            ComboStatus::Active => {
                let distance = distance_between(self.state.start_x, x);
                let multiplier = self.state.multiplier;
                let stars_earned = distance.saturating_mul(multiplier);
                self.reset();
                Some(ComboNotice::Ended {
                    multiplier,
                    distance,
                    stars_earned,
                })
            }
        }
    }

    /// Drop everything without payout.
    pub fn reset(&mut self) {
        self.state = ComboState::default();
    }

    /// Hash combo state.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.state.status as u8);
        hasher.update_u32(self.state.air_event_count);
        hasher.update_u32(self.state.multiplier);
        hasher.update_f32(self.state.start_x);
        hasher.update_u32(self.state.combo_distance);
        hasher.update_f32(self.state.timeout_ms);
    }
}

/// floor(x - start), never negative.
#[inline]
fn distance_between(start_x: f32, x: f32) -> u32 {
    (x - start_x).max(0.0).floor() as u32
}
