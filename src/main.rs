//! Rail Runner
//!
//! Headless demo: plays one seeded run with a simple autopilot, settles
//! star rewards, stores the score and verifies the recorded transcript.

use std::env;
use std::fs;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rail_runner::{
    derive_run_seed, TICK_RATE, VERSION,
    game::{
        events::GameEventData,
        input::InputFrame,
        state::{RunId, RunState},
        tick::{tick, RunConfig},
    },
    replay::{verify_transcript, RunTranscript, TranscriptRecorder},
    session::{InMemoryLeaderboard, LeaderboardStore, LedgerRewardClient, RewardClaim, RewardClient},
};

/// Optional path to a JSON `RunConfig`.
const CONFIG_ENV: &str = "RAIL_RUNNER_CONFIG";

const PLAYER: &str = "autopilot";
const REWARD_ACCOUNT: &str = "demo-wallet";

/// Five minutes at 60 Hz.
const MAX_TICKS: u32 = 5 * 60 * TICK_RATE;

/// How far ahead (in seconds of travel) the autopilot looks for hazards.
const AUTOPILOT_LEAD_SECS: f32 = 0.2;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Rail Runner v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = load_config()?;
    info!("Config hash: {}", hex::encode(config.config_hash()?));

    demo_run(config).await
}

fn load_config() -> Result<RunConfig> {
    let Ok(path) = env::var(CONFIG_ENV) else {
        return Ok(RunConfig::default());
    };

    let json = fs::read_to_string(&path).with_context(|| format!("reading config {}", path))?;
    let config = RunConfig::from_json(&json).with_context(|| format!("parsing config {}", path))?;
    info!("Loaded config from {}", path);
    Ok(config)
}

/// Jump when the next hazard is about to reach the player.
fn autopilot(state: &RunState, config: &RunConfig, held: &mut bool) -> InputFrame {
    let front = state.body.position.x + config.physics.player_half_width;
    let reach = state.speed * AUTOPILOT_LEAD_SECS;
    let threat = state
        .director
        .obstacles()
        .values()
        .any(|o| o.right() > front && o.x - front < reach);

    // Release between presses so each press is a fresh edge
    let press = threat && !*held;
    *held = press;
    if press {
        InputFrame::jump()
    } else {
        InputFrame::new()
    }
}

async fn demo_run(config: RunConfig) -> Result<()> {
    info!("=== Starting Demo Run ===");

    let run_id = RunId::new([7u8; 16]);
    let seed = derive_run_seed(run_id.as_bytes(), PLAYER);
    let mut state = RunState::new(run_id, seed, &config);
    let frame_dt = 1.0 / TICK_RATE as f32;

    info!("Run ID: {}", run_id.to_uuid_string());
    info!("RNG Seed: {}", seed);

    let mut recorder = TranscriptRecorder::start(&state, PLAYER, &config, frame_dt)?;
    let rewards = LedgerRewardClient::new();
    let mut claims = Vec::new();
    let mut held = false;
    let mut total_events = 0;

    while state.tick < MAX_TICKS {
        let input = autopilot(&state, &config, &mut held);
        recorder.record_input(state.tick, input);

        let result = tick(&mut state, input, frame_dt, &config)?;
        recorder.after_tick(&state, &result.events);
        total_events += result.events.len();

        for event in &result.events {
            if let GameEventData::ComboEnded { stars_earned, .. } = event.data {
                if stars_earned > 0 {
                    let rewards = rewards.clone();
                    let claim = RewardClaim {
                        account_id: REWARD_ACCOUNT.to_string(),
                        amount: u64::from(stars_earned),
                    };
                    claims.push(tokio::spawn(async move { rewards.claim(claim).await }));
                }
            }
        }

        // Report every 10 seconds
        if state.tick % (10 * TICK_RATE) == 0 {
            info!(
                "Tick {}: distance {}, speed {:.1}, score {}",
                state.tick,
                state.whole_distance(),
                state.speed,
                state.score()
            );
        }

        if result.ended {
            break;
        }
    }

    info!("=== Run Results ===");
    match state.summary {
        Some(summary) => {
            info!("Cause: {:?}", summary.cause);
            info!("Survived: {:.1} s", summary.survival_ms as f64 / 1000.0);
            info!("Distance: {}", summary.distance);
            info!("Stars: {}", summary.stats.stars);
            info!(
                "Jumps: {}, tricks: {}, grinds: {}, combos: {} (best x{})",
                summary.stats.jumps,
                summary.stats.tricks,
                summary.stats.grinds,
                summary.stats.combos_completed,
                summary.stats.best_multiplier
            );
            info!("Final score: {}", summary.final_score);
        }
        None => info!("Still running after {} ticks, score {}", state.tick, state.score()),
    }
    info!("Total events: {}", total_events);

    for claim in claims {
        match claim.await? {
            Ok(receipt) => info!("Reward {} settled: {}", receipt.claim_id, receipt.amount),
            Err(e) => warn!("Reward failed: {}", e),
        }
    }
    info!("Wallet balance: {}", rewards.balance(REWARD_ACCOUNT).await);

    let leaderboard = InMemoryLeaderboard::new();
    let final_score = state.summary.map_or_else(|| state.score(), |s| s.final_score);
    let entry = leaderboard.submit(PLAYER.to_string(), final_score).await?;
    info!("Leaderboard entry {} at {}", entry.id, entry.recorded_at);

    // Verify by replaying the transcript after a round trip through bytes
    info!("=== Verifying Transcript ===");
    let transcript = recorder.finish(&state);
    let bytes = transcript.to_bytes()?;
    info!(
        "Transcript: {} bytes, {} input deltas, {} checkpoints",
        bytes.len(),
        transcript.inputs.deltas.len(),
        transcript.checkpoints.len()
    );

    let decoded = RunTranscript::from_bytes(&bytes)?;
    let verification = verify_transcript(&decoded);

    info!("Recorded Hash: {}", hex::encode(verification.expected_final_hash));
    info!("Replay Hash:   {}", hex::encode(verification.computed_final_hash));

    if !verification.valid {
        bail!(
            "transcript failed verification: {}",
            verification
                .error
                .map_or_else(|| "unknown".to_string(), |e| e.to_string())
        );
    }
    info!("REPLAY VERIFIED: Hashes match!");
    Ok(())
}
