//! Simulation errors.

use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Rail lookup misses are not here: losing the rail is an ordinary
/// transition to `Airborne`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Frame delta was zero, negative, NaN or infinite.
    #[error("invalid timestep: {0} s")]
    InvalidTimestep(f32),

    /// The level director could not fill its lookahead window.
    #[error("spawn starvation at scroll {scroll_x}: {reason}")]
    SpawnStarvation {
        /// Scroll position of the failed maintenance call.
        scroll_x: f32,
        /// What made the window unfillable.
        reason: String,
    },

    /// A tuning value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SimError {
    /// True for errors that end the run rather than a single tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::InvalidTimestep(_))
    }
}
