//! Replay System
//!
//! Verifiable run outcomes through:
//! - Run transcript recording
//! - Verification by deterministic replay
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    REPLAY SYSTEM                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transcript.rs   - Seed, rules, inputs, checkpoints         │
//! │  verify.rs       - Verification by replay                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod transcript;
pub mod verify;

// Re-export key types
pub use transcript::{
    RunTranscript, RunMetadata, RunResult, InputRecord,
    StateCheckpoint, TranscriptEvent, TranscriptRecorder, TranscriptError,
    CHECKPOINT_INTERVAL, TRANSCRIPT_VERSION,
};
pub use verify::{verify_transcript, VerificationResult, VerificationError, CheckpointResult};
