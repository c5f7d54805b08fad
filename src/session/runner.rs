//! Run Session
//!
//! Drives one run in real time: drains player input, ticks the core at a
//! fixed rate, turns core events into UI notices and talks to the external
//! collaborators. The core never awaits; everything async lives here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::rng::derive_run_seed;
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::InputFrame;
use crate::game::state::{RunId, RunState, RunSummary};
use crate::game::tick::{tick, RunConfig};
use crate::replay::transcript::{RunTranscript, TranscriptRecorder};
use crate::session::leaderboard::{LeaderboardStore, ScoreEntry};
use crate::session::protocol::{Notice, PlayerSnapshot};
use crate::session::rewards::{RewardClaim, RewardClient};

/// Configuration for a run session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Name submitted to the leaderboard.
    pub player_name: String,
    /// Account that receives star rewards; none disables claims.
    pub reward_account: Option<String>,
    /// Record a replay transcript.
    pub record_transcript: bool,
    /// Send a snapshot every N ticks (0 disables).
    pub snapshot_every: u32,
    /// Stop after this many ticks even if the run is still going.
    pub max_ticks: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            player_name: "player".to_string(),
            reward_account: None,
            record_transcript: true,
            snapshot_every: 1,
            max_ticks: None,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The core rejected a tick.
    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimError),

    /// Session settings are unusable.
    #[error("Invalid session config: {0}")]
    InvalidConfig(String),
}

/// What a finished session hands back.
#[derive(Debug)]
pub struct RunOutcome {
    /// Final score and stats, if the run reached game over.
    pub summary: Option<RunSummary>,
    /// Ticks simulated.
    pub ticks: u32,
    /// Replay transcript, if recording was on.
    pub transcript: Option<RunTranscript>,
    /// Leaderboard row, if the score was stored.
    pub leaderboard_entry: Option<ScoreEntry>,
}

/// One run driven in real time.
pub struct RunSession {
    config: SessionConfig,
    run_config: RunConfig,
    state: RunState,
    leaderboard: Arc<dyn LeaderboardStore>,
    rewards: Arc<dyn RewardClient>,
    inputs: mpsc::Receiver<InputFrame>,
    notices: mpsc::UnboundedSender<Notice>,
    /// Last frame received; held state persists until the UI sends a change.
    held: InputFrame,
}

impl RunSession {
    /// Create a session for a fresh run.
    ///
    /// The rng seed is derived from the run id and player name.
    pub fn new(
        config: SessionConfig,
        run_config: RunConfig,
        run_id: RunId,
        leaderboard: Arc<dyn LeaderboardStore>,
        rewards: Arc<dyn RewardClient>,
        inputs: mpsc::Receiver<InputFrame>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Result<Self, SessionError> {
        if config.tick_rate == 0 || config.tick_rate > 1000 {
            return Err(SessionError::InvalidConfig(format!(
                "tick rate {} out of range",
                config.tick_rate
            )));
        }
        run_config.validate()?;

        let seed = derive_run_seed(run_id.as_bytes(), &config.player_name);
        let state = RunState::new(run_id, seed, &run_config);

        Ok(Self {
            config,
            run_config,
            state,
            leaderboard,
            rewards,
            inputs,
            notices,
            held: InputFrame::new(),
        })
    }

    /// Run until game over, the tick limit, or the input channel closing.
    pub async fn run(mut self) -> Result<RunOutcome, SessionError> {
        let frame_dt = 1.0 / self.config.tick_rate as f32;
        let mut recorder = if self.config.record_transcript {
            Some(TranscriptRecorder::start(
                &self.state,
                &self.config.player_name,
                &self.run_config,
                frame_dt,
            )?)
        } else {
            None
        };

        info!(
            run = %self.state.run_id.to_uuid_string(),
            player = %self.config.player_name,
            tick_rate = self.config.tick_rate,
            "Run started"
        );

        let tick_duration = Duration::from_micros(1_000_000 / self.config.tick_rate as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            let Some(input) = self.drain_inputs() else {
                info!(tick = self.state.tick, "Input closed, run abandoned");
                break;
            };

            if let Some(recorder) = recorder.as_mut() {
                recorder.record_input(self.state.tick, input);
            }

            let result = match tick(&mut self.state, input, frame_dt, &self.run_config) {
                Ok(result) => result,
                Err(e) => {
                    error!(tick = self.state.tick, error = %e, "Simulation stopped");
                    self.notify(Notice::SimulationError { reason: e.to_string() });
                    return Err(e.into());
                }
            };

            if let Some(recorder) = recorder.as_mut() {
                recorder.after_tick(&self.state, &result.events);
            }

            self.dispatch(&result.events);

            let every = self.config.snapshot_every;
            if every > 0 && self.state.tick % every == 0 {
                self.notify(Notice::Snapshot(PlayerSnapshot::capture(&self.state)));
            }

            if result.ended {
                break;
            }
            if self.config.max_ticks.is_some_and(|max| self.state.tick >= max) {
                debug!(tick = self.state.tick, "Tick limit reached");
                break;
            }
        }

        let leaderboard_entry = match self.state.summary {
            Some(summary) => self.submit_score(summary.final_score).await,
            None => None,
        };

        Ok(RunOutcome {
            summary: self.state.summary,
            ticks: self.state.tick,
            transcript: recorder.map(|r| r.finish(&self.state)),
            leaderboard_entry,
        })
    }

    /// Merge everything queued since the last tick.
    ///
    /// Returns `None` once the sender is gone and the queue is empty.
    fn drain_inputs(&mut self) -> Option<InputFrame> {
        let mut merged = self.held;
        let mut received = false;
        loop {
            match self.inputs.try_recv() {
                Ok(frame) => {
                    merged = InputFrame::merge([merged, frame]);
                    self.held = frame;
                    received = true;
                }
                Err(TryRecvError::Empty) => return Some(merged),
                // Apply the final frames; the next drain reports the close
                Err(TryRecvError::Disconnected) => return received.then_some(merged),
            }
        }
    }

    /// Forward core events to the UI and start reward claims.
    fn dispatch(&self, events: &[GameEvent]) {
        for event in events {
            if let GameEventData::ComboEnded { stars_earned, .. } = event.data {
                if stars_earned > 0 {
                    self.spawn_reward_claim(u64::from(stars_earned));
                }
            }

            if let Some(notice) = Notice::from_event(event) {
                self.notify(notice);
            }
        }
    }

    fn spawn_reward_claim(&self, amount: u64) {
        let Some(account_id) = self.config.reward_account.clone() else {
            return;
        };

        let rewards = Arc::clone(&self.rewards);
        let notices = self.notices.clone();
        tokio::spawn(async move {
            let claim = RewardClaim { account_id: account_id.clone(), amount };
            let notice = match rewards.claim(claim).await {
                Ok(receipt) => Notice::RewardSettled {
                    account_id: receipt.account_id,
                    amount: receipt.amount,
                    receipt_id: receipt.claim_id.to_string(),
                },
                Err(e) => {
                    warn!(account = %account_id, amount, error = %e, "Reward claim failed");
                    Notice::RewardFailed {
                        account_id,
                        amount,
                        reason: e.to_string(),
                    }
                }
            };
            // UI may already be gone; the claim itself still happened
            let _ = notices.send(notice);
        });
    }

    async fn submit_score(&self, score: u64) -> Option<ScoreEntry> {
        match self.leaderboard.submit(self.config.player_name.clone(), score).await {
            Ok(entry) => {
                info!(player = %entry.player_name, score, "Score submitted");
                self.notify(Notice::ScoreSubmitted {
                    entry_id: entry.id.to_string(),
                    score,
                });
                Some(entry)
            }
            Err(e) => {
                warn!(score, error = %e, "Score submission failed");
                self.notify(Notice::ScoreSubmitFailed { reason: e.to_string() });
                None
            }
        }
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("Notice dropped, UI receiver closed");
        }
    }
}
