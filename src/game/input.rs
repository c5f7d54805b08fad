//! Input Capture and Edge Resolution
//!
//! The input collaborator hands the core one [`InputFrame`] per frame.
//! [`InputResolver`] collapses the held state into a single, debounced
//! "jump requested" edge. [`RunInputTape`] records frames for replay.

use serde::{Serialize, Deserialize};
use tracing::debug;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// What the player is holding during one frame.
///
/// The tick lives next to the frame (on the tape), not in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Bit 0: jump held (key down or touch active). Other bits unused.
    pub flags: u8,
}

impl InputFrame {
    /// Jump held.
    pub const FLAG_JUMP: u8 = 0x01;

    /// Nothing held.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Frame with the jump control held down.
    pub const fn jump() -> Self {
        Self { flags: Self::FLAG_JUMP }
    }

    /// Check if jump is held this frame.
    #[inline]
    pub fn jump_held(&self) -> bool {
        self.flags & Self::FLAG_JUMP != 0
    }

    /// Merge several frames received within one tick.
    ///
    /// A flag counts as set if any of the frames set it, so a tap that is
    /// pressed and released between two ticks is not lost.
    pub fn merge<I: IntoIterator<Item = InputFrame>>(frames: I) -> Self {
        frames.into_iter().fold(Self::new(), |acc, frame| Self {
            flags: acc.flags | frame.flags,
        })
    }
}

// =============================================================================
// EDGE RESOLUTION
// =============================================================================

/// Tuning for the input resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Rising edges closer than this to the last accepted edge are bounce.
    pub debounce_ms: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { debounce_ms: 40.0 }
    }
}

/// Turns the held jump flag into a discrete request edge.
///
/// Holding the control (or OS key repeat) produces a single edge; the
/// control must be released before it can fire again.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputResolver {
    config: InputConfig,
    was_held: bool,
    since_last_edge_ms: f32,
}

impl InputResolver {
    /// Create a resolver. The first press is always accepted.
    pub fn new(config: InputConfig) -> Self {
        let since_last_edge_ms = config.debounce_ms;
        Self {
            config,
            was_held: false,
            since_last_edge_ms,
        }
    }

    /// Feed this frame's input; returns true on a new jump request.
    pub fn resolve(&mut self, frame: InputFrame, elapsed_ms: f32) -> bool {
        self.since_last_edge_ms += elapsed_ms;

        let held = frame.jump_held();
        let rising = held && !self.was_held;
        self.was_held = held;

        if !rising {
            return false;
        }

        if self.since_last_edge_ms < self.config.debounce_ms {
            debug!(
                since_ms = self.since_last_edge_ms,
                "jump edge rejected as bounce"
            );
            return false;
        }

        self.since_last_edge_ms = 0.0;
        true
    }

    /// Whether the control was held on the last frame.
    pub fn is_held(&self) -> bool {
        self.was_held
    }
}

// =============================================================================
// INPUT TAPE
// =============================================================================

/// A change of held input, effective from `tick` onward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDelta {
    /// First tick the frame applies to
    pub tick: u32,
    /// Held input from then on
    pub frame: InputFrame,
}

impl InputDelta {
    /// Pair a tick with the frame that starts there.
    pub fn new(tick: u32, frame: InputFrame) -> Self {
        Self { tick, frame }
    }
}

/// Every input of one run, stored as changes only.
///
/// A run that holds jump for two seconds costs one entry, not 120.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunInputTape {
    /// Last tick covered by the tape
    pub end_tick: u32,

    /// Sorted by tick, strictly increasing
    deltas: Vec<InputDelta>,

    #[serde(skip)]
    last_frame: InputFrame,
}

impl RunInputTape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tape from recorded deltas.
    ///
    /// Deltas must be sorted by tick; out-of-order entries are dropped.
    pub fn from_deltas(deltas: Vec<InputDelta>, end_tick: u32) -> Self {
        let mut tape = Self::new();
        for delta in deltas {
            if tape.deltas.last().is_some_and(|d| d.tick >= delta.tick) {
                continue;
            }
            tape.record(delta.tick, delta.frame);
        }
        tape.finalize(end_tick);
        tape
    }

    /// Append the frame applied at `tick`; repeats of the held frame are free.
    pub fn record(&mut self, tick: u32, frame: InputFrame) {
        self.end_tick = tick;

        if frame != self.last_frame {
            self.last_frame = frame;
            self.deltas.push(InputDelta::new(tick, frame));
        }
    }

    /// Frame in effect at `tick` (idle before the first change).
    pub fn get_input_at(&self, tick: u32) -> InputFrame {
        match self.deltas.partition_point(|d| d.tick <= tick) {
            0 => InputFrame::new(),
            n => self.deltas[n - 1].frame,
        }
    }

    /// Recorded changes, oldest first.
    pub fn deltas(&self) -> &[InputDelta] {
        &self.deltas
    }

    /// Number of recorded changes.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Mark the last tick the tape covers.
    pub fn finalize(&mut self, end_tick: u32) {
        self.end_tick = end_tick;
    }

    /// Every tick from 0 through `end_tick` with its frame.
    pub fn replay_iter(&self) -> impl Iterator<Item = (u32, InputFrame)> + '_ {
        let mut next = 0;
        let mut held = InputFrame::new();
        (0..=self.end_tick).map(move |tick| {
            while let Some(delta) = self.deltas.get(next).filter(|d| d.tick <= tick) {
                held = delta.frame;
                next += 1;
            }
            (tick, held)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f32 = 16.0;

    #[test]
    fn test_input_frame_flags() {
        let frame = InputFrame::new();
        assert!(!frame.jump_held());
        assert_eq!(frame, InputFrame::default());
        assert!(InputFrame::jump().jump_held());
        assert_eq!(InputFrame::jump().flags, InputFrame::FLAG_JUMP);
    }

    #[test]
    fn test_merge_keeps_short_taps() {
        let merged = InputFrame::merge([InputFrame::new(), InputFrame::jump(), InputFrame::new()]);
        assert!(merged.jump_held());

        let idle = InputFrame::merge(Vec::new());
        assert_eq!(idle, InputFrame::new());
    }

    #[test]
    fn test_held_key_fires_once() {
        let mut resolver = InputResolver::new(InputConfig::default());

        assert!(resolver.resolve(InputFrame::jump(), FRAME_MS));
        for _ in 0..30 {
            assert!(!resolver.resolve(InputFrame::jump(), FRAME_MS));
        }
        assert!(resolver.is_held());

        // Release and press again after the debounce window
        assert!(!resolver.resolve(InputFrame::new(), FRAME_MS));
        assert!(resolver.resolve(InputFrame::jump(), FRAME_MS));
    }

    #[test]
    fn test_bounce_is_filtered() {
        let mut resolver = InputResolver::new(InputConfig::default());

        assert!(resolver.resolve(InputFrame::jump(), FRAME_MS));
        assert!(!resolver.resolve(InputFrame::new(), FRAME_MS));
        // 32 ms after the accepted edge: bounce
        assert!(!resolver.resolve(InputFrame::jump(), FRAME_MS));
        assert!(!resolver.resolve(InputFrame::new(), FRAME_MS));
        // 64 ms after the accepted edge: a real press
        assert!(resolver.resolve(InputFrame::jump(), FRAME_MS));
    }

    #[test]
    fn test_tape_delta_compression() {
        let mut tape = RunInputTape::new();

        for tick in 0..4 {
            tape.record(tick, InputFrame::jump());
        }
        assert_eq!(tape.delta_count(), 1);

        tape.record(4, InputFrame::new());
        assert_eq!(tape.delta_count(), 2);
    }

    #[test]
    fn test_tape_get_at() {
        let mut tape = RunInputTape::new();

        tape.record(10, InputFrame::jump());
        tape.record(20, InputFrame::new());
        tape.record(30, InputFrame::jump());

        assert_eq!(tape.get_input_at(5), InputFrame::new());
        assert!(tape.get_input_at(10).jump_held());
        assert!(tape.get_input_at(15).jump_held());
        assert_eq!(tape.get_input_at(25), InputFrame::new());
        assert!(tape.get_input_at(100).jump_held());
    }

    #[test]
    fn test_replay_iterator() {
        let mut tape = RunInputTape::new();
        tape.record(0, InputFrame::new());
        tape.record(3, InputFrame::jump());
        tape.finalize(5);

        let frames: Vec<_> = tape.replay_iter().collect();

        assert_eq!(frames.len(), 6);
        assert!(frames[..3].iter().all(|(_, f)| !f.jump_held()));
        assert!(frames[3..].iter().all(|(_, f)| f.jump_held()));
    }

    #[test]
    fn test_from_deltas_drops_out_of_order() {
        let deltas = vec![
            InputDelta::new(5, InputFrame::jump()),
            InputDelta::new(3, InputFrame::new()),
            InputDelta::new(9, InputFrame::new()),
        ];
        let tape = RunInputTape::from_deltas(deltas, 12);

        assert_eq!(tape.delta_count(), 2);
        assert_eq!(tape.end_tick, 12);
        assert!(tape.get_input_at(7).jump_held());
        assert_eq!(tape.get_input_at(9), InputFrame::new());
    }
}
