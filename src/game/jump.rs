//! Jump Resolution
//!
//! Coyote time and jump buffering. Two counters run on a fixed sub-tick,
//! independent of the frame delta; a jump fires only while both are
//! non-zero.

use serde::{Serialize, Deserialize};

/// Tuning for the jump resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    /// Grace period after leaving ground or rail (ms)
    pub coyote_ms: u32,
    /// How long an early press is remembered (ms)
    pub buffer_ms: u32,
    /// Fixed counter sub-tick (ms)
    pub tick_ms: u32,
    /// Vertical velocity applied by a jump (units/s, negative is up)
    pub impulse: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            coyote_ms: 90,
            buffer_ms: 120,
            tick_ms: 16,
            impulse: -280.0,
        }
    }
}

/// The two grace counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpState {
    /// Remaining coyote time (ms)
    pub coyote_ms: u32,
    /// Remaining jump buffer (ms)
    pub buffer_ms: u32,
}

impl JumpState {
    /// The single firing condition.
    #[inline]
    pub fn can_fire(&self) -> bool {
        self.coyote_ms > 0 && self.buffer_ms > 0
    }
}

/// Counter state machine driven by the simulation loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JumpResolver {
    config: JumpConfig,
    state: JumpState,
    accumulator_ms: f32,
}

impl JumpResolver {
    /// Create a resolver with both counters at zero.
    pub fn new(config: JumpConfig) -> Self {
        Self {
            config,
            state: JumpState::default(),
            accumulator_ms: 0.0,
        }
    }

    /// Current counters.
    pub fn state(&self) -> JumpState {
        self.state
    }

    /// Overwrite the counters.
    pub fn set_state(&mut self, state: JumpState) {
        self.state = state;
    }

    /// Upward impulse to apply when a jump fires.
    pub fn impulse(&self) -> f32 {
        self.config.impulse
    }

    /// Run the fixed sub-ticks covered by `elapsed_ms`.
    ///
    /// A grounded body always leaves with a full coyote window, even on a
    /// frame too short to complete a sub-tick.
    pub fn advance(&mut self, elapsed_ms: f32, grounded: bool) {
        let tick_ms = self.config.tick_ms.max(1);
        if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            self.accumulator_ms += elapsed_ms;
        }

        while self.accumulator_ms >= tick_ms as f32 {
            self.accumulator_ms -= tick_ms as f32;
            self.step(grounded);
        }

        if grounded {
            self.state.coyote_ms = self.config.coyote_ms;
        }
    }

    /// One fixed sub-tick.
    pub fn step(&mut self, grounded: bool) {
        let tick_ms = self.config.tick_ms;
        self.state.coyote_ms = if grounded {
            self.config.coyote_ms
        } else {
            self.state.coyote_ms.saturating_sub(tick_ms)
        };
        self.state.buffer_ms = self.state.buffer_ms.saturating_sub(tick_ms);
    }

    /// Register a new jump request. Overwrites, never accumulates.
    pub fn request(&mut self) {
        self.state.buffer_ms = self.config.buffer_ms;
    }

    /// Fire if both counters are live; firing zeroes both.
    pub fn try_fire(&mut self) -> bool {
        if !self.state.can_fire() {
            return false;
        }
        self.state = JumpState::default();
        true
    }
}
