//! Run Transcript Recording
//!
//! Records everything needed to replay a run and check its outcome: seed,
//! rules, frame delta, delta-compressed inputs and periodic state hashes.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::hash::StateHash;
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{InputDelta, InputFrame, RunInputTape};
use crate::game::rail::RailId;
use crate::game::state::{GameOverCause, RunState};
use crate::game::tick::RunConfig;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Checkpoint interval in ticks (every 10 seconds at 60Hz).
pub const CHECKPOINT_INTERVAL: u32 = 600;

/// Complete run transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunTranscript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Who, when and under which rules.
    pub metadata: RunMetadata,

    /// Hash of the state before the first tick.
    pub initial_state_hash: StateHash,

    /// Delta-compressed inputs.
    pub inputs: InputRecord,

    /// State hash checkpoints.
    pub checkpoints: Vec<StateCheckpoint>,

    /// Final outcome.
    pub result: Option<RunResult>,

    /// Notable events.
    pub events: Vec<TranscriptEvent>,
}

/// Run metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Run identifier (UUID bytes).
    pub run_id: [u8; 16],

    /// Name the score is filed under.
    pub player_name: String,

    /// Level RNG seed.
    pub rng_seed: u64,

    /// Unix timestamp (ms) when the run started.
    pub start_timestamp_ms: i64,

    /// Rules the run was played under.
    pub config: RunConfig,

    /// Hash of `config` at record time.
    pub config_hash: StateHash,

    /// Frame delta used for every tick (s).
    pub frame_dt: f32,
}

/// Recorded inputs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputRecord {
    /// Entries where the input changed.
    pub deltas: Vec<InputDelta>,

    /// Ticks recorded.
    pub input_count: u32,
}

impl InputRecord {
    /// Rebuild a tape for replay.
    pub fn to_tape(&self) -> RunInputTape {
        RunInputTape::from_deltas(self.deltas.clone(), self.input_count.saturating_sub(1))
    }
}

/// State checkpoint for partial verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateCheckpoint {
    /// Tick number.
    pub tick: u32,

    /// State hash at this tick.
    pub state_hash: StateHash,

    /// RNG state at this tick.
    pub rng_state: [u64; 2],
}

/// Final run outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Ticks simulated.
    pub end_tick: u32,

    /// Score at the end.
    pub final_score: u64,

    /// What ended the run; `None` if it was stopped while alive.
    pub cause: Option<GameOverCause>,

    /// Final state hash.
    pub final_state_hash: StateHash,
}

/// Transcript event (subset of GameEvent for compact storage).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptEvent {
    /// A jump fired.
    Jump {
        /// Tick.
        tick: u32,
    },

    /// Caught a rail.
    Grind {
        /// Tick.
        tick: u32,
        /// Rail handle.
        rail: RailId,
    },

    /// Combo paid out.
    ComboPaid {
        /// Tick.
        tick: u32,
        /// Final multiplier.
        multiplier: u32,
        /// Stars earned.
        stars: u32,
    },

    /// Run ended.
    GameOver {
        /// Tick.
        tick: u32,
        /// Final score.
        score: u64,
    },
}

impl TranscriptEvent {
    /// Convert a GameEvent to TranscriptEvent (if relevant).
    pub fn from_game_event(event: &GameEvent) -> Option<Self> {
        let tick = event.tick;
        match &event.data {
            GameEventData::JumpExecuted { .. } => Some(TranscriptEvent::Jump { tick }),
            GameEventData::GrindStarted { rail } => Some(TranscriptEvent::Grind { tick, rail: *rail }),
            GameEventData::ComboEnded { multiplier, stars_earned, .. } => Some(TranscriptEvent::ComboPaid {
                tick,
                multiplier: *multiplier,
                stars: *stars_earned,
            }),
            GameEventData::GameOver { final_score, .. } => Some(TranscriptEvent::GameOver {
                tick,
                score: *final_score,
            }),
            // Other events are not recorded in transcript
            _ => None,
        }
    }
}

impl RunTranscript {
    /// Create an empty transcript.
    pub fn new(metadata: RunMetadata, initial_state_hash: StateHash) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            metadata,
            initial_state_hash,
            inputs: InputRecord::default(),
            checkpoints: Vec::new(),
            result: None,
            events: Vec::new(),
        }
    }

    /// Record a state checkpoint.
    pub fn add_checkpoint(&mut self, tick: u32, state_hash: StateHash, rng_state: [u64; 2]) {
        self.checkpoints.push(StateCheckpoint {
            tick,
            state_hash,
            rng_state,
        });
    }

    /// Record a game event if it is one worth keeping.
    pub fn record_event(&mut self, event: &GameEvent) {
        if let Some(transcript_event) = TranscriptEvent::from_game_event(event) {
            self.events.push(transcript_event);
        }
    }

    /// Finalize the transcript with the run result.
    pub fn finalize(&mut self, result: RunResult) {
        self.result = Some(result);
    }

    /// Check if transcript is complete.
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TranscriptError> {
        bincode::serialize(self).map_err(|e| TranscriptError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        let transcript: Self =
            bincode::deserialize(data).map_err(|e| TranscriptError::DeserializationFailed(e.to_string()))?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::VersionMismatch {
                expected: TRANSCRIPT_VERSION,
                got: transcript.version,
            });
        }
        Ok(transcript)
    }
}

/// Builds a transcript alongside a live run.
///
/// Call [`Self::record_input`] before each tick and [`Self::after_tick`]
/// after it.
#[derive(Debug)]
pub struct TranscriptRecorder {
    transcript: RunTranscript,
    tape: RunInputTape,
    checkpoint_interval: u32,
}

impl TranscriptRecorder {
    /// Start recording a run that has not ticked yet.
    pub fn start(
        state: &RunState,
        player_name: &str,
        config: &RunConfig,
        frame_dt: f32,
    ) -> Result<Self, SimError> {
        let metadata = RunMetadata {
            run_id: state.run_id.0,
            player_name: player_name.to_string(),
            rng_seed: state.rng_seed,
            start_timestamp_ms: chrono::Utc::now().timestamp_millis(),
            config: config.clone(),
            config_hash: config.config_hash()?,
            frame_dt,
        };

        Ok(Self {
            transcript: RunTranscript::new(metadata, state.compute_hash()),
            tape: RunInputTape::new(),
            checkpoint_interval: CHECKPOINT_INTERVAL,
        })
    }

    /// Override the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, interval: u32) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Record the input about to be applied at `tick`.
    pub fn record_input(&mut self, tick: u32, frame: InputFrame) {
        self.tape.record(tick, frame);
        self.transcript.inputs.input_count = tick + 1;
    }

    /// Capture events and, on interval ticks, a checkpoint.
    pub fn after_tick(&mut self, state: &RunState, events: &[GameEvent]) {
        for event in events {
            self.transcript.record_event(event);
        }

        if state.tick % self.checkpoint_interval == 0 {
            self.transcript
                .add_checkpoint(state.tick, state.compute_hash(), state.rng.state());
        }
    }

    /// Close the transcript with the run's current state.
    pub fn finish(mut self, state: &RunState) -> RunTranscript {
        self.tape.finalize(state.tick.saturating_sub(1));
        self.transcript.inputs.deltas = self.tape.deltas().to_vec();
        self.transcript.finalize(RunResult {
            end_tick: state.tick,
            final_score: state.summary.map_or_else(|| state.score(), |s| s.final_score),
            cause: state.summary.map(|s| s.cause),
            final_state_hash: state.compute_hash(),
        });

        debug!(
            ticks = state.tick,
            deltas = self.transcript.inputs.deltas.len(),
            checkpoints = self.transcript.checkpoints.len(),
            "transcript closed"
        );
        self.transcript
    }
}

/// Errors that can occur with transcripts.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization failed.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Version this build reads.
        expected: u8,
        /// Version found.
        got: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::RunId;
    use crate::game::tick::tick;

    const DT: f32 = 1.0 / 60.0;

    fn record_run(ticks: u32) -> (RunState, RunTranscript) {
        let config = RunConfig::default();
        let mut state = RunState::new(RunId::new([3; 16]), 99, &config);
        let mut recorder = TranscriptRecorder::start(&state, "ada", &config, DT)
            .unwrap()
            .with_checkpoint_interval(60);

        for t in 0..ticks {
            let input = if t % 40 < 2 { InputFrame::jump() } else { InputFrame::new() };
            recorder.record_input(state.tick, input);
            let result = tick(&mut state, input, DT, &config).unwrap();
            recorder.after_tick(&state, &result.events);
            if result.ended {
                break;
            }
        }

        let transcript = recorder.finish(&state);
        (state, transcript)
    }

    #[test]
    fn test_recorder_captures_run() {
        let (state, transcript) = record_run(200);

        assert!(transcript.is_complete());
        assert_eq!(transcript.inputs.input_count, state.tick);
        assert!(!transcript.inputs.deltas.is_empty());
        assert!(transcript.events.iter().any(|e| matches!(e, TranscriptEvent::Jump { .. })));

        let result = transcript.result.as_ref().unwrap();
        assert_eq!(result.end_tick, state.tick);
        assert_eq!(result.final_state_hash, state.compute_hash());
        assert!(transcript.checkpoints.iter().all(|c| c.tick % 60 == 0));
    }

    #[test]
    fn test_transcript_serialization_roundtrip() {
        let (_, transcript) = record_run(120);

        let bytes = transcript.to_bytes().unwrap();
        let decoded = RunTranscript::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.metadata.player_name, "ada");
        assert_eq!(decoded.metadata.config, RunConfig::default());
        assert_eq!(decoded.result, transcript.result);
        assert_eq!(decoded.events, transcript.events);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let (_, mut transcript) = record_run(10);
        transcript.version = 99;
        let bytes = transcript.to_bytes().unwrap();

        assert!(matches!(
            RunTranscript::from_bytes(&bytes),
            Err(TranscriptError::VersionMismatch { expected: 1, got: 99 })
        ));
        assert!(RunTranscript::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_input_record_rebuilds_tape() {
        let record = InputRecord {
            deltas: vec![
                InputDelta::new(0, InputFrame::jump()),
                InputDelta::new(2, InputFrame::new()),
            ],
            input_count: 5,
        };

        let tape = record.to_tape();
        let frames: Vec<_> = tape.replay_iter().map(|(_, f)| f.jump_held()).collect();
        assert_eq!(frames, [true, true, false, false, false]);
    }
}
