//! Player Physics Body
//!
//! Position, velocity and gravity integration for the runner.
//! The body never moves backwards: x advances by the world speed every tick.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::collision::Aabb;
use crate::game::error::SimError;
use crate::game::rail::RailId;

/// Tuning for the physics body and the ground surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward acceleration (units/s^2)
    pub gravity: f32,
    /// Y of the ground surface
    pub ground_y: f32,
    /// Falling below this y ends the run
    pub fall_limit_y: f32,
    /// Half the width of the player's hitbox
    pub player_half_width: f32,
    /// Height of the player's hitbox (feet to head)
    pub player_height: f32,
    /// Starting x of the run
    pub start_x: f32,
    /// Longest frame (seconds) a single tick integrates; longer frames are clamped
    pub max_frame_dt: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 900.0,
            ground_y: 200.0,
            fall_limit_y: 320.0,
            player_half_width: 6.0,
            player_height: 20.0,
            start_x: 0.0,
            max_frame_dt: 0.1,
        }
    }
}

impl PhysicsConfig {
    /// Clamp a valid frame time to `max_frame_dt`.
    ///
    /// Non-finite and non-positive values pass through untouched so
    /// [`PlayerBody::integrate`] can reject them.
    pub fn clamp_frame_dt(&self, dt: f32) -> f32 {
        if dt.is_finite() && dt > self.max_frame_dt {
            self.max_frame_dt
        } else {
            dt
        }
    }
}

/// Contact state of the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// Resting on the ground surface
    Grounded,
    /// Free fall, gravity applies
    Airborne,
    /// Locked to a rail; gravity suspended
    Grinding {
        /// Handle of the rail being ground
        rail: RailId,
    },
}

impl MotionState {
    /// Stable index for hashing.
    pub fn index(self) -> u8 {
        match self {
            MotionState::Grounded => 0,
            MotionState::Airborne => 1,
            MotionState::Grinding { .. } => 2,
        }
    }
}

/// The player entity's physics state.
///
/// `position` is the bottom-center of the hitbox (the feet).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerBody {
    /// Feet position in world space
    pub position: Vec2,
    /// Velocity; `x` is overwritten with the world speed every tick
    pub velocity: Vec2,
    /// Ground / air / rail contact
    pub motion: MotionState,
    gravity: f32,
    half_width: f32,
    height: f32,
}

impl PlayerBody {
    /// Create a body standing on the ground at the configured start.
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            position: Vec2::new(config.start_x, config.ground_y),
            velocity: Vec2::ZERO,
            motion: MotionState::Grounded,
            gravity: config.gravity,
            half_width: config.player_half_width,
            height: config.player_height,
        }
    }

    /// Advance the body by `dt` seconds at `forward_speed` units/s.
    ///
    /// Rejects non-finite or non-positive `dt` without touching state.
    pub fn integrate(&mut self, dt: f32, forward_speed: f32) -> Result<(), SimError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }

        self.velocity.x = forward_speed;
        self.position = self.position + self.velocity.scale(dt);

        if self.is_rail_locked() {
            self.velocity.y = 0.0;
        } else {
            self.velocity.y += self.gravity * dt;
        }

        Ok(())
    }

    /// Resting on the ground or locked to a rail.
    #[inline]
    pub fn is_grounded(&self) -> bool {
        matches!(self.motion, MotionState::Grounded | MotionState::Grinding { .. })
    }

    /// Resting on the ground surface itself.
    #[inline]
    pub fn on_ground_surface(&self) -> bool {
        self.motion == MotionState::Grounded
    }

    /// Locked to a rail.
    #[inline]
    pub fn is_rail_locked(&self) -> bool {
        matches!(self.motion, MotionState::Grinding { .. })
    }

    /// Handle of the rail being ground, if any.
    #[inline]
    pub fn current_rail(&self) -> Option<RailId> {
        match self.motion {
            MotionState::Grinding { rail } => Some(rail),
            _ => None,
        }
    }

    /// Apply a jump impulse. Clears any rail attachment.
    ///
    /// Returns the rail the body was grinding, if any.
    pub fn jump(&mut self, impulse: f32) -> Option<RailId> {
        let left_rail = self.current_rail();
        self.velocity.y = impulse;
        self.motion = MotionState::Airborne;
        left_rail
    }

    /// Lock the body onto a rail with its feet at `y`.
    pub fn lock_to_rail(&mut self, rail: RailId, y: f32) {
        self.position.y = y;
        self.velocity.y = 0.0;
        self.motion = MotionState::Grinding { rail };
    }

    /// Rest the body on the ground surface.
    pub fn land_on_ground(&mut self, ground_y: f32) {
        self.position.y = ground_y;
        self.velocity.y = 0.0;
        self.motion = MotionState::Grounded;
    }

    /// Hitbox in world space.
    pub fn hitbox(&self) -> Aabb {
        Aabb::new(
            Vec2::new(self.position.x - self.half_width, self.position.y - self.height),
            Vec2::new(self.position.x + self.half_width, self.position.y),
        )
    }
}
