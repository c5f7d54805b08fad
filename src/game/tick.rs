//! Simulation Tick
//!
//! The per-frame orchestrator. Every step below runs in a fixed order, once
//! per frame, with the loop as the only writer of run state.

#[cfg(feature = "debug-tracing")]
use tracing::trace;
use tracing::{info, warn};
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, hash_with_domain};
use crate::game::collision::first_obstacle_hit;
use crate::game::combo::{AirEvent, ComboConfig, ComboNotice};
use crate::game::error::SimError;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{InputConfig, InputFrame};
use crate::game::jump::JumpConfig;
use crate::game::level::DirectorConfig;
use crate::game::physics::PhysicsConfig;
use crate::game::rail::{update_attachment, RailConfig, RailTransition};
use crate::game::state::{GameOverCause, RunState, RunSummary};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the run is over
    pub ended: bool,
    /// Score/stats handoff once the run is over
    pub summary: Option<RunSummary>,
}

/// Every tuning value of a run.
///
/// Missing JSON fields keep their defaults, so a config file only needs
/// the values it changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Gravity, ground and hitbox
    pub physics: PhysicsConfig,
    /// Press debounce
    pub input: InputConfig,
    /// Coyote time and buffering
    pub jump: JumpConfig,
    /// Rail snapping and chaining
    pub rail: RailConfig,
    /// Spawning and difficulty ramp
    pub director: DirectorConfig,
    /// Combo activation and timeout
    pub combo: ComboConfig,
}

impl RunConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        self.director.validate()?;

        let physics = &self.physics;
        if !(physics.gravity.is_finite() && physics.gravity > 0.0) {
            return Err(SimError::InvalidConfig(format!("gravity must be positive, got {}", physics.gravity)));
        }
        if !(physics.fall_limit_y > physics.ground_y) {
            return Err(SimError::InvalidConfig(format!(
                "fall limit {} must be below the ground at {}",
                physics.fall_limit_y, physics.ground_y
            )));
        }
        if !(physics.max_frame_dt.is_finite() && physics.max_frame_dt > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "max_frame_dt must be positive, got {}",
                physics.max_frame_dt
            )));
        }
        if !(physics.player_half_width > 0.0 && physics.player_height > 0.0) {
            return Err(SimError::InvalidConfig("player hitbox must have positive size".into()));
        }
        if self.jump.tick_ms == 0 {
            return Err(SimError::InvalidConfig("jump tick_ms must be at least 1".into()));
        }
        if !(self.jump.impulse.is_finite() && self.jump.impulse < 0.0) {
            return Err(SimError::InvalidConfig(format!("jump impulse must point up, got {}", self.jump.impulse)));
        }
        if self.combo.activation_events == 0 {
            return Err(SimError::InvalidConfig("combo activation_events must be at least 1".into()));
        }

        Ok(())
    }

    /// Hash of the canonical JSON encoding.
    ///
    /// Pins a transcript to the rules it was recorded under.
    pub fn config_hash(&self) -> Result<StateHash, SimError> {
        let bytes = serde_json::to_vec(self).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        Ok(hash_with_domain(b"RAIL_RUNNER_CONFIG_V1", &bytes))
    }
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The run state (will be mutated)
/// * `input` - This frame's input
/// * `dt` - Frame delta in seconds
/// * `config` - Run configuration
///
/// # Errors
///
/// A bad `dt` is not an error: integration is skipped and a
/// `TimestepRejected` event is emitted. A `dt` longer than
/// `physics.max_frame_dt` is clamped to it. Errors returned here are fatal
/// configuration problems such as spawn starvation.
pub fn tick(
    state: &mut RunState,
    input: InputFrame,
    dt: f32,
    config: &RunConfig,
) -> Result<TickResult, SimError> {
    let mut result = TickResult::default();

    if state.is_ended() {
        result.ended = true;
        result.summary = state.summary;
        return Ok(result);
    }

    state.tick += 1;
    let dt = config.physics.clamp_frame_dt(dt);
    let elapsed_ms = if dt.is_finite() && dt > 0.0 { dt * 1000.0 } else { 0.0 };

    // 1. Jump counters from the grounded state going into this frame
    state.jump.advance(elapsed_ms, state.body.is_grounded());

    // 2. New press edge feeds the buffer
    if state.input.resolve(input, elapsed_ms) {
        state.jump.request();
    }

    // 3. Fire if both counters are live
    if state.jump.try_fire() {
        execute_jump(state);
    }

    // 4. One automatic trick per airtime
    if !state.body.is_grounded() && !state.trick_performed {
        perform_trick(state);
    }

    // 5. Integrate at the speed from the last director query
    integrate(state, dt);

    // 6. Rail / ground transitions
    let transition = update_attachment(
        &mut state.body,
        state.director.rails(),
        &config.rail,
        config.physics.ground_y,
    );
    if let Some(transition) = transition {
        apply_rail_transition(state, transition);
    }

    // 7. Keep the lookahead window filled and refresh the speed
    let scroll_x = state.distance();
    state.director.maintain(scroll_x, &mut state.rng)?;
    state.director.despawn_behind(scroll_x);
    state.speed = state.director.speed_at(scroll_x);

    // 8. Combo off this tick's contact edges
    update_combo(state, transition, elapsed_ms);

    // 9. Terminal conditions
    if let Some(cause) = check_terminal(state, config) {
        let summary = state.finish(cause);
        info!(
            tick = state.tick,
            score = summary.final_score,
            distance = summary.distance,
            survival_ms = summary.survival_ms,
            ?cause,
            "run over"
        );
        result.ended = true;
        result.summary = Some(summary);
    }

    #[cfg(feature = "debug-tracing")]
    trace!(
        tick = state.tick,
        x = state.body.position.x,
        y = state.body.position.y,
        motion = ?state.body.motion,
        speed = state.speed,
        "tick"
    );

    result.events = state.take_events();
    Ok(result)
}

fn execute_jump(state: &mut RunState) {
    let position = state.body.position;
    let from_rail = state.body.jump(state.jump.impulse());
    state.trick_performed = false;
    state.stats.jumps += 1;
    state.push_event(GameEvent::jump_executed(state.tick, position, from_rail));
}

fn perform_trick(state: &mut RunState) {
    let x = state.body.position.x;
    state.trick_performed = true;
    state.stats.tricks += 1;
    state.push_event(GameEvent::trick_performed(state.tick, x));

    let notice = state.combo.register(AirEvent::Trick, true, x);
    push_combo_notice(state, notice);
}

/// Integrate, or reject the frame.
fn integrate(state: &mut RunState, dt: f32) {
    match state.body.integrate(dt, state.speed) {
        Ok(()) => state.elapsed_secs += f64::from(dt),
        Err(err) => {
            warn!(tick = state.tick, %err, "skipping integration");
            state.push_event(GameEvent::timestep_rejected(state.tick, dt));
        }
    }
}

fn apply_rail_transition(state: &mut RunState, transition: RailTransition) {
    let tick = state.tick;
    let event = match transition {
        RailTransition::Attached { rail } => {
            state.stats.grinds += 1;
            GameEvent::new(tick, GameEventData::GrindStarted { rail })
        }
        RailTransition::Chained { from, to } => {
            GameEvent::new(tick, GameEventData::GrindChained { from, to })
        }
        RailTransition::Detached { rail, reason } => {
            GameEvent::new(tick, GameEventData::GrindEnded { rail, reason })
        }
        RailTransition::Landed => GameEvent::landed(tick, state.body.position.x),
    };
    state.push_event(event);
}

fn update_combo(state: &mut RunState, transition: Option<RailTransition>, elapsed_ms: f32) {
    let x = state.body.position.x;

    match transition {
        // The catch happened in the air, though the body is now locked
        Some(RailTransition::Attached { .. }) => {
            let notice = state.combo.register(AirEvent::RailGrind, true, x);
            state.combo.arm_timeout();
            push_combo_notice(state, notice);
        }
        Some(RailTransition::Landed) => {
            let notice = state.combo.on_landing(x);
            push_combo_notice(state, notice);
            return;
        }
        _ => {}
    }

    let notice = state.combo.on_frame(x, elapsed_ms);
    push_combo_notice(state, notice);
}

fn push_combo_notice(state: &mut RunState, notice: Option<ComboNotice>) {
    let Some(notice) = notice else {
        return;
    };

    let data = match notice {
        ComboNotice::Activated { multiplier } => {
            state.stats.best_multiplier = state.stats.best_multiplier.max(multiplier);
            GameEventData::ComboActivated { multiplier }
        }
        ComboNotice::Updated { multiplier, distance } => {
            state.stats.best_multiplier = state.stats.best_multiplier.max(multiplier);
            GameEventData::ComboUpdated { multiplier, distance }
        }
        ComboNotice::Ended { multiplier, distance, stars_earned } => {
            state.stats.combos_completed += 1;
            state.stats.stars += u64::from(stars_earned);
            info!(multiplier, distance, stars_earned, "combo paid out");
            GameEventData::ComboEnded { multiplier, distance, stars_earned }
        }
        ComboNotice::Discarded { air_events } => GameEventData::ComboDiscarded { air_events },
    };

    let event = GameEvent::new(state.tick, data);
    state.push_event(event);
}

/// Free-falling past the fall limit, or touching a hazard.
///
/// Runs after ground and rail snapping, so a body that landed this frame
/// is never reported as fallen.
fn check_terminal(state: &RunState, config: &RunConfig) -> Option<GameOverCause> {
    let body = &state.body;
    if !body.is_grounded() && body.position.y > config.physics.fall_limit_y {
        return Some(GameOverCause::Fell);
    }

    first_obstacle_hit(&body.hitbox(), state.director.obstacles())
        .map(|(_, obstacle)| GameOverCause::Obstacle(obstacle.kind))
}

/// Replay a run from recorded inputs.
///
/// Every tick uses the same `frame_dt`. Stops early if the run ends.
pub fn replay_run(
    initial_state: RunState,
    tape: &crate::game::input::RunInputTape,
    tick_count: u32,
    frame_dt: f32,
    config: &RunConfig,
) -> Result<(RunState, Vec<GameEvent>), SimError> {
    let mut state = initial_state;
    let mut all_events = Vec::new();

    for (_, frame) in tape.replay_iter().take(tick_count as usize) {
        let result = tick(&mut state, frame, frame_dt, config)?;
        all_events.extend(result.events);

        if result.ended {
            break;
        }
    }

    Ok((state, all_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combo::ComboStatus;
    use crate::game::input::RunInputTape;
    use crate::game::level::{ObstacleKind, ObstacleSpec, SpawnKind, SpawnWeight};
    use crate::game::physics::MotionState;
    use crate::game::rail::RailSegment;
    use crate::game::state::{RunId, RunPhase};

    const DT: f32 = 1.0 / 60.0;

    /// No procedural spawns within reach; tests place their own.
    fn quiet_config() -> RunConfig {
        RunConfig {
            director: DirectorConfig {
                first_spawn_distance: 100_000.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn new_run(config: &RunConfig) -> RunState {
        RunState::new(RunId::new([7; 16]), 12345, config)
    }

    fn names(events: &[GameEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.data.name()).collect()
    }

    #[test]
    fn test_first_tick_fills_window() {
        let config = RunConfig::default();
        let mut state = new_run(&config);

        let result = tick(&mut state, InputFrame::new(), DT, &config).unwrap();

        assert!(!result.ended);
        assert_eq!(state.tick, 1);
        assert!(state.director.frontier() >= state.distance() + config.director.lookahead());
        assert!(state.body.on_ground_surface());
        assert!((state.body.position.x - 100.0 * DT).abs() < 1e-4);
    }

    #[test]
    fn test_jump_and_trick_same_tick() {
        let config = quiet_config();
        let mut state = new_run(&config);

        let result = tick(&mut state, InputFrame::jump(), DT, &config).unwrap();

        assert_eq!(names(&result.events), ["jump_executed", "trick_performed"]);
        assert_eq!(state.body.motion, MotionState::Airborne);
        assert!(state.trick_performed);
        assert_eq!(state.combo.state().air_event_count, 1);

        // Holding the button does not jump again on landing
        let mut landed = false;
        for _ in 0..60 {
            let result = tick(&mut state, InputFrame::jump(), DT, &config).unwrap();
            assert!(!names(&result.events).contains(&"jump_executed"));
            if names(&result.events).contains(&"landed") {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(state.stats.jumps, 1);
    }

    #[test]
    fn test_invalid_timestep_skips_integration() {
        let config = quiet_config();
        let mut state = new_run(&config);
        tick(&mut state, InputFrame::new(), DT, &config).unwrap();
        let before = state.body.position;

        let result = tick(&mut state, InputFrame::new(), f32::NAN, &config).unwrap();

        assert_eq!(names(&result.events), ["timestep_rejected"]);
        assert_eq!(state.body.position, before);
        assert_eq!(state.tick, 2);
        assert!(!result.ended);
    }

    #[test]
    fn test_fatal_collision() {
        let config = quiet_config();
        let mut state = new_run(&config);
        state
            .director
            .insert_obstacle(ObstacleSpec::new(10.0, ObstacleKind::WoodBlock, config.physics.ground_y));

        let mut ended = None;
        for _ in 0..10 {
            let result = tick(&mut state, InputFrame::new(), DT, &config).unwrap();
            if result.ended {
                ended = Some(result);
                break;
            }
        }

        let result = ended.expect("collision should end the run");
        let summary = result.summary.unwrap();
        assert_eq!(summary.cause, GameOverCause::Obstacle(ObstacleKind::WoodBlock));
        assert_eq!(state.phase, RunPhase::Ended);
        assert!(matches!(result.events.last().map(|e| &e.data), Some(GameEventData::GameOver { .. })));

        // Frozen: no further movement or events
        let x = state.body.position.x;
        let after = tick(&mut state, InputFrame::jump(), DT, &config).unwrap();
        assert!(after.ended);
        assert!(after.events.is_empty());
        assert_eq!(after.summary, Some(summary));
        assert_eq!(state.body.position.x, x);
    }

    #[test]
    fn test_fall_limit_ends_run() {
        // Below the limit and still rising, so nothing snaps it back
        let config = quiet_config();
        let mut state = new_run(&config);
        state.body.motion = MotionState::Airborne;
        state.body.position.y = config.physics.fall_limit_y + 10.0;
        state.body.velocity.y = -100.0;

        let result = tick(&mut state, InputFrame::new(), DT, &config).unwrap();

        assert!(result.ended);
        assert_eq!(result.summary.map(|s| s.cause), Some(GameOverCause::Fell));
    }

    #[test]
    fn test_long_frame_landing_survives() {
        let mut config = quiet_config();
        for max_frame_dt in [config.physics.max_frame_dt, 1.0] {
            config.physics.max_frame_dt = max_frame_dt;
            let mut state = new_run(&config);
            state.body.motion = MotionState::Airborne;
            state.body.position.y = config.physics.ground_y - 5.0;
            state.body.velocity.y = 280.0;

            let result = tick(&mut state, InputFrame::new(), 0.5, &config).unwrap();

            assert!(!result.ended, "max_frame_dt {max_frame_dt}: {:?}", result.summary);
            assert!(state.body.on_ground_surface());
            assert_eq!(state.body.position.y, config.physics.ground_y);
            assert!(names(&result.events).contains(&"landed"));
        }
    }

    #[test]
    fn test_huge_frame_is_clamped() {
        let config = RunConfig::default();
        let mut state = new_run(&config);

        let result = tick(&mut state, InputFrame::new(), 1.0e12, &config).unwrap();

        let max_step = config.director.base_speed * config.physics.max_frame_dt;
        assert!(!result.ended);
        assert!((state.body.position.x - max_step).abs() < 1e-3);
        assert!((state.elapsed_secs - f64::from(config.physics.max_frame_dt)).abs() < 1e-6);
        assert!(state.director.frontier() < config.director.first_spawn_distance + 2.0 * config.director.lookahead());
    }

    #[test]
    fn test_game_over_drops_active_combo() {
        let config = quiet_config();
        let mut state = new_run(&config);

        // Jump (trick is the first air event), then two more to activate
        tick(&mut state, InputFrame::jump(), DT, &config).unwrap();
        let x = state.body.position.x;
        state.combo.register(AirEvent::RailGrind, true, x);
        let activated = state.combo.register(AirEvent::RailGrind, true, x);
        assert_eq!(activated, Some(ComboNotice::Activated { multiplier: 3 }));

        state
            .director
            .insert_obstacle(ObstacleSpec::new(x - 2.0, ObstacleKind::Barricade, config.physics.ground_y));
        let result = tick(&mut state, InputFrame::new(), DT, &config).unwrap();

        assert!(result.ended);
        assert!(!names(&result.events).contains(&"combo_ended"));
        let summary = result.summary.unwrap();
        assert_eq!(summary.cause, GameOverCause::Obstacle(ObstacleKind::Barricade));
        assert_eq!(summary.stats.stars, 0);
        assert_eq!(summary.stats.combos_completed, 0);
        assert_eq!(summary.final_score, u64::from(state.whole_distance()));
        assert_eq!(state.combo.state().status, ComboStatus::Inactive);
    }

    #[test]
    fn test_spawn_starvation_is_fatal() {
        let mut config = RunConfig::default();
        config.director.weights = vec![SpawnWeight {
            kind: SpawnKind::Rail,
            easy: 0.0,
            hard: 0.0,
        }];
        let mut state = new_run(&config);

        let err = tick(&mut state, InputFrame::new(), DT, &config).unwrap_err();
        assert!(matches!(err, SimError::SpawnStarvation { .. }));
    }

    #[test]
    fn test_grind_combo_end_to_end() {
        let config = quiet_config();
        let rail_y = config.physics.ground_y - 36.0;
        let mut state = new_run(&config);
        for i in 0..3 {
            state.director.insert_rail(RailSegment::new(30.0 + 32.0 * i as f32, rail_y, 32.0));
        }
        for i in 0..3 {
            state.director.insert_rail(RailSegment::new(140.0 + 32.0 * i as f32, rail_y, 32.0));
        }

        let mut events = Vec::new();
        let mut jumped_off_rail = false;
        let mut landed = false;
        for _ in 0..600 {
            let press = state.tick == 0 || (!jumped_off_rail && state.body.is_rail_locked() && state.body.position.x >= 80.0);
            if press && state.tick > 0 {
                jumped_off_rail = true;
            }
            let input = if press { InputFrame::jump() } else { InputFrame::new() };

            let result = tick(&mut state, input, DT, &config).unwrap();
            assert!(!result.ended, "run ended at x={}", state.body.position.x);
            let done = result.events.iter().any(|e| matches!(e.data, GameEventData::Landed { .. }));
            events.extend(result.events);
            if done {
                landed = true;
                break;
            }
        }
        assert!(landed);

        let grinds = events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::GrindStarted { .. }))
            .count();
        assert_eq!(grinds, 2);
        assert!(events.iter().any(|e| e.data == GameEventData::ComboActivated { multiplier: 3 }));

        let ended = events.iter().find_map(|e| match e.data {
            GameEventData::ComboEnded { multiplier, distance, stars_earned } => Some((multiplier, distance, stars_earned)),
            _ => None,
        });
        let (multiplier, distance, stars) = ended.expect("combo should pay out on landing");
        assert_eq!(multiplier, 4);
        assert!((250..300).contains(&distance), "distance {distance}");
        assert_eq!(stars, distance * 4);

        assert_eq!(state.stats.combos_completed, 1);
        assert_eq!(state.stats.stars, u64::from(stars));
        assert_eq!(state.score(), u64::from(state.whole_distance()) + u64::from(stars));
        assert!(state.body.on_ground_surface());
    }

    #[test]
    fn test_tick_determinism() {
        let config = RunConfig::default();
        let mut state1 = new_run(&config);
        let mut state2 = new_run(&config);

        for t in 0..600u32 {
            let input = if t % 45 < 3 { InputFrame::jump() } else { InputFrame::new() };
            let r1 = tick(&mut state1, input, DT, &config).unwrap();
            let r2 = tick(&mut state2, input, DT, &config).unwrap();
            assert_eq!(names(&r1.events), names(&r2.events));
            if r1.ended {
                break;
            }
        }

        assert_eq!(state1.tick, state2.tick);
        assert_eq!(state1.compute_hash(), state2.compute_hash());
        assert_eq!(state1.director.obstacles(), state2.director.obstacles());
    }

    #[test]
    fn test_replay_matches_live_run() {
        let config = RunConfig::default();
        let mut live = new_run(&config);
        let mut tape = RunInputTape::new();

        for t in 0..400u32 {
            let input = if t % 50 < 2 { InputFrame::jump() } else { InputFrame::new() };
            tape.record(live.tick, input);
            if tick(&mut live, input, DT, &config).unwrap().ended {
                break;
            }
        }

        let (replayed, _) = replay_run(new_run(&config), &tape, live.tick, DT, &config).unwrap();
        assert_eq!(replayed.tick, live.tick);
        assert_eq!(replayed.compute_hash(), live.compute_hash());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = RunConfig::from_json(r#"{ "jump": { "coyote_ms": 120 } }"#).unwrap();
        assert_eq!(config.jump.coyote_ms, 120);
        assert_eq!(config.jump.buffer_ms, 120);
        assert_eq!(config.director, DirectorConfig::default());

        assert!(RunConfig::from_json(r#"{ "jump": { "impulse": 50.0 } }"#).is_err());
        assert!(RunConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_config_hash_tracks_rules() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());

        b.combo.base_multiplier = 5;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }
}
