//! Verification API
//!
//! Verify runs by deterministic replay of their transcripts.

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::hash::StateHash;
use crate::game::error::SimError;
use crate::game::state::{RunId, RunState};
use crate::game::tick::tick;
use crate::replay::transcript::{RunResult, RunTranscript, TRANSCRIPT_VERSION};

/// Verification result.
#[derive(Debug)]
pub struct VerificationResult {
    /// Did verification pass?
    pub valid: bool,

    /// Final state hash (from replay).
    pub computed_final_hash: StateHash,

    /// Expected final hash (from transcript).
    pub expected_final_hash: StateHash,

    /// Checkpoint verification results.
    pub checkpoint_results: Vec<CheckpointResult>,

    /// Detailed error if verification failed.
    pub error: Option<VerificationError>,
}

impl VerificationResult {
    fn failed(error: VerificationError, checkpoint_results: Vec<CheckpointResult>) -> Self {
        warn!(%error, "transcript verification failed");
        Self {
            valid: false,
            computed_final_hash: [0; 32],
            expected_final_hash: [0; 32],
            checkpoint_results,
            error: Some(error),
        }
    }
}

/// Result of verifying a single checkpoint.
#[derive(Debug)]
pub struct CheckpointResult {
    /// Tick number.
    pub tick: u32,
    /// Expected hash from transcript.
    pub expected: StateHash,
    /// Computed hash from replay.
    pub computed: StateHash,
    /// Did this checkpoint match?
    pub valid: bool,
}

/// Errors that can occur during verification.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    /// Transcript version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Expected version.
        expected: u8,
        /// Actual version.
        got: u8,
    },

    /// Embedded config does not hash to the recorded value.
    #[error("config hash mismatch")]
    ConfigMismatch {
        /// Recorded hash.
        expected: StateHash,
        /// Hash of the embedded config.
        computed: StateHash,
    },

    /// Initial state hash mismatch.
    #[error("initial state hash mismatch")]
    InitialStateMismatch {
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },

    /// Checkpoint hash mismatch.
    #[error("checkpoint mismatch at tick {tick}")]
    CheckpointMismatch {
        /// Tick where mismatch occurred.
        tick: u32,
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },

    /// Final state hash mismatch.
    #[error("final state hash mismatch")]
    FinalStateMismatch {
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },

    /// Replay reached a different outcome.
    #[error("result mismatch: expected score {expected_score}, replay scored {computed_score}")]
    ResultMismatch {
        /// Recorded score.
        expected_score: u64,
        /// Replayed score.
        computed_score: u64,
    },

    /// The replay itself failed.
    #[error("replay failed: {0}")]
    Simulation(#[from] SimError),

    /// Transcript is incomplete.
    #[error("transcript is incomplete")]
    IncompleteTranscript,
}

/// Verify a run transcript by full replay.
///
/// Replays every tick and compares state hashes at each checkpoint and at
/// the end, then compares the outcome.
pub fn verify_transcript(transcript: &RunTranscript) -> VerificationResult {
    if transcript.version != TRANSCRIPT_VERSION {
        return VerificationResult::failed(
            VerificationError::VersionMismatch {
                expected: TRANSCRIPT_VERSION,
                got: transcript.version,
            },
            vec![],
        );
    }

    let Some(result) = &transcript.result else {
        return VerificationResult::failed(VerificationError::IncompleteTranscript, vec![]);
    };

    // 1. Rules must be the ones recorded
    let metadata = &transcript.metadata;
    let config = &metadata.config;
    match config.config_hash() {
        Ok(computed) if computed == metadata.config_hash => {}
        Ok(computed) => {
            return VerificationResult::failed(
                VerificationError::ConfigMismatch {
                    expected: metadata.config_hash,
                    computed,
                },
                vec![],
            );
        }
        Err(e) => return VerificationResult::failed(e.into(), vec![]),
    }

    // 2. Reconstruct initial state
    let mut state = RunState::new(RunId::new(metadata.run_id), metadata.rng_seed, config);
    let initial_hash = state.compute_hash();
    if initial_hash != transcript.initial_state_hash {
        return VerificationResult::failed(
            VerificationError::InitialStateMismatch {
                expected: transcript.initial_state_hash,
                computed: initial_hash,
            },
            vec![],
        );
    }

    // 3. Replay tick by tick with checkpoint verification
    let tape = transcript.inputs.to_tape();
    let mut checkpoint_results = Vec::new();
    let mut checkpoints = transcript.checkpoints.iter().peekable();

    while state.tick < result.end_tick && !state.is_ended() {
        let frame = tape.get_input_at(state.tick);
        if let Err(e) = tick(&mut state, frame, metadata.frame_dt, config) {
            return VerificationResult::failed(e.into(), checkpoint_results);
        }

        while let Some(checkpoint) = checkpoints.next_if(|c| c.tick <= state.tick) {
            if checkpoint.tick < state.tick {
                // Recorded at a tick the replay never stopped on
                continue;
            }

            let computed = state.compute_hash();
            let valid = computed == checkpoint.state_hash;
            checkpoint_results.push(CheckpointResult {
                tick: checkpoint.tick,
                expected: checkpoint.state_hash,
                computed,
                valid,
            });

            if !valid {
                return VerificationResult::failed(
                    VerificationError::CheckpointMismatch {
                        tick: checkpoint.tick,
                        expected: checkpoint.state_hash,
                        computed,
                    },
                    checkpoint_results,
                );
            }
        }
    }

    // 4. Verify final state and outcome
    let final_hash = state.compute_hash();
    let error = check_outcome(&state, final_hash, result);
    let valid = error.is_none();

    debug!(
        valid,
        ticks = state.tick,
        checkpoints = checkpoint_results.len(),
        final_hash = %hex::encode(final_hash),
        "transcript replayed"
    );

    VerificationResult {
        valid,
        computed_final_hash: final_hash,
        expected_final_hash: result.final_state_hash,
        checkpoint_results,
        error,
    }
}

fn check_outcome(state: &RunState, final_hash: StateHash, result: &RunResult) -> Option<VerificationError> {
    if final_hash != result.final_state_hash {
        return Some(VerificationError::FinalStateMismatch {
            expected: result.final_state_hash,
            computed: final_hash,
        });
    }

    let computed_score = state.summary.map_or_else(|| state.score(), |s| s.final_score);
    if computed_score != result.final_score || state.summary.map(|s| s.cause) != result.cause {
        return Some(VerificationError::ResultMismatch {
            expected_score: result.final_score,
            computed_score,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputFrame;
    use crate::game::tick::RunConfig;
    use crate::replay::transcript::TranscriptRecorder;

    const DT: f32 = 1.0 / 60.0;

    fn record(ticks: u32) -> RunTranscript {
        let config = RunConfig::default();
        let mut state = RunState::new(RunId::new([8; 16]), 2024, &config);
        let mut recorder = TranscriptRecorder::start(&state, "grace", &config, DT)
            .unwrap()
            .with_checkpoint_interval(30);

        for t in 0..ticks {
            let input = if t % 37 < 3 { InputFrame::jump() } else { InputFrame::new() };
            recorder.record_input(state.tick, input);
            let result = tick(&mut state, input, DT, &config).unwrap();
            recorder.after_tick(&state, &result.events);
            if result.ended {
                break;
            }
        }

        recorder.finish(&state)
    }

    #[test]
    fn test_valid_transcript_verifies() {
        let transcript = record(300);
        let result = verify_transcript(&transcript);

        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.computed_final_hash, result.expected_final_hash);
        assert_eq!(result.checkpoint_results.len(), transcript.checkpoints.len());
        assert!(result.checkpoint_results.iter().all(|c| c.valid));
    }

    #[test]
    fn test_tampered_input_detected() {
        let mut transcript = record(300);
        let delta = transcript
            .inputs
            .deltas
            .iter_mut()
            .find(|d| d.frame.jump_held())
            .unwrap();
        delta.frame = InputFrame::new();

        let result = verify_transcript(&transcript);
        assert!(!result.valid);
        assert!(matches!(
            result.error,
            Some(VerificationError::CheckpointMismatch { .. } | VerificationError::FinalStateMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_config_detected() {
        let mut transcript = record(60);
        transcript.metadata.config.physics.gravity = 1200.0;

        let result = verify_transcript(&transcript);
        assert!(matches!(result.error, Some(VerificationError::ConfigMismatch { .. })));
    }

    #[test]
    fn test_tampered_score_detected() {
        let mut transcript = record(120);
        if let Some(result) = transcript.result.as_mut() {
            result.final_score += 1000;
        }

        let result = verify_transcript(&transcript);
        assert!(matches!(result.error, Some(VerificationError::ResultMismatch { .. })));
    }

    #[test]
    fn test_incomplete_transcript() {
        let mut transcript = record(10);
        transcript.result = None;

        let result = verify_transcript(&transcript);
        assert!(!result.valid);
        assert!(matches!(result.error, Some(VerificationError::IncompleteTranscript)));
    }
}
