//! Run State Definitions
//!
//! Everything a single run owns, plus the score and stats handed off at
//! game over. Registries use BTreeMap for deterministic iteration order.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, compute_state_hash};
use crate::game::combo::ComboEngine;
use crate::game::events::GameEvent;
use crate::game::input::InputResolver;
use crate::game::jump::JumpResolver;
use crate::game::level::{LevelDirector, ObstacleKind};
use crate::game::physics::PlayerBody;
use crate::game::tick::RunConfig;

// =============================================================================
// RUN ID
// =============================================================================

/// Unique run identifier (UUID as bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub [u8; 16]);

impl RunId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// =============================================================================
// SCORE & STATS
// =============================================================================

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverCause {
    /// Touched a hazard
    Obstacle(ObstacleKind),
    /// Dropped below the fall limit
    Fell,
}

/// Counts collected over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Jumps executed
    pub jumps: u32,
    /// Automatic tricks
    pub tricks: u32,
    /// Rail attaches (chains not counted)
    pub grinds: u32,
    /// Combos that paid out
    pub combos_completed: u32,
    /// Highest multiplier reached
    pub best_multiplier: u32,
    /// Stars banked from combos
    pub stars: u64,
}

/// Score/stats handoff produced once, at game over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Distance plus stars
    pub final_score: u64,
    /// Whole units travelled
    pub distance: u32,
    /// Time survived (ms)
    pub survival_ms: u64,
    /// Collected counts
    pub stats: RunStats,
    /// What ended the run
    pub cause: GameOverCause,
}

// =============================================================================
// RUN PHASE
// =============================================================================

/// Run lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Ticking
    #[default]
    Running,
    /// Frozen after game over
    Ended,
}

// =============================================================================
// RUN STATE
// =============================================================================

/// Complete state of one run.
///
/// The simulation loop is the only writer. Rails and obstacles live in the
/// director; the body refers to them by handle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunState {
    /// Run identifier
    pub run_id: RunId,

    /// Ticks simulated so far
    pub tick: u32,

    /// Lifecycle
    pub phase: RunPhase,

    /// Seed the run was started with
    pub rng_seed: u64,

    /// Level generation RNG
    pub rng: DeterministicRng,

    /// Player physics
    pub body: PlayerBody,

    /// Press edge detection
    pub input: InputResolver,

    /// Coyote / buffer counters
    pub jump: JumpResolver,

    /// Combo state machine
    pub combo: ComboEngine,

    /// Spawn registries and difficulty ramp
    pub director: LevelDirector,

    /// World speed from the last director query (units/s)
    pub speed: f32,

    /// X where the run began
    pub origin_x: f32,

    /// Trick already performed this airtime
    pub trick_performed: bool,

    /// Accumulated valid frame time (s)
    pub elapsed_secs: f64,

    /// Collected counts
    pub stats: RunStats,

    /// Set once at game over
    pub summary: Option<RunSummary>,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl RunState {
    /// Create a run standing on the ground at the configured start.
    pub fn new(run_id: RunId, rng_seed: u64, config: &RunConfig) -> Self {
        let body = PlayerBody::new(&config.physics);
        let origin_x = config.physics.start_x;
        let director = LevelDirector::new(config.director.clone(), origin_x, config.physics.ground_y);
        let speed = director.speed_at(0.0);

        Self {
            run_id,
            tick: 0,
            phase: RunPhase::Running,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            body,
            input: InputResolver::new(config.input.clone()),
            jump: JumpResolver::new(config.jump.clone()),
            combo: ComboEngine::new(config.combo.clone()),
            director,
            speed,
            origin_x,
            trick_performed: false,
            elapsed_secs: 0.0,
            stats: RunStats::default(),
            summary: None,
            pending_events: Vec::new(),
        }
    }

    /// Distance travelled; also the camera's scroll position.
    #[inline]
    pub fn distance(&self) -> f32 {
        (self.body.position.x - self.origin_x).max(0.0)
    }

    /// Whole units travelled.
    #[inline]
    pub fn whole_distance(&self) -> u32 {
        self.distance().floor() as u32
    }

    /// Current score: distance plus banked stars.
    pub fn score(&self) -> u64 {
        u64::from(self.whole_distance()) + self.stats.stars
    }

    /// Time survived so far (ms).
    pub fn survival_ms(&self) -> u64 {
        (self.elapsed_secs * 1000.0).floor() as u64
    }

    /// Check if the run has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, RunPhase::Ended)
    }

    /// Freeze the run and build the handoff.
    ///
    /// Any combo still in flight is dropped without payout. Calling this on
    /// an ended run returns the existing summary.
    pub fn finish(&mut self, cause: GameOverCause) -> RunSummary {
        if let Some(summary) = self.summary {
            return summary;
        }

        self.combo.reset();
        self.phase = RunPhase::Ended;

        let summary = RunSummary {
            final_score: self.score(),
            distance: self.whole_distance(),
            survival_ms: self.survival_ms(),
            stats: self.stats,
            cause,
        };
        self.summary = Some(summary);
        self.push_event(GameEvent::game_over(
            self.tick,
            summary.final_score,
            summary.survival_ms,
            summary.stats,
            cause,
        ));
        summary
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);

            hasher.update_vec2(self.body.position);
            hasher.update_vec2(self.body.velocity);
            hasher.update_u8(self.body.motion.index());
            hasher.update_u32(self.body.current_rail().map_or(u32::MAX, |r| r.0));

            let jump = self.jump.state();
            hasher.update_u32(jump.coyote_ms);
            hasher.update_u32(jump.buffer_ms);
            hasher.update_bool(self.trick_performed);

            self.combo.hash_into(hasher);
            self.director.hash_into(hasher);

            hasher.update_f32(self.speed);
            hasher.update_u64(self.stats.stars);
            hasher.update_bool(self.is_ended());
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;

    fn new_run(seed: u64) -> RunState {
        RunState::new(RunId::new([0; 16]), seed, &RunConfig::default())
    }

    #[test]
    fn test_run_id_uuid_round_trip() {
        let id = RunId::random();
        assert_eq!(RunId::from_uuid_str(&id.to_uuid_string()), Some(id));
        assert_eq!(RunId::from_uuid_str("not-a-uuid"), None);
    }

    #[test]
    fn test_new_run_starts_grounded_at_base_speed() {
        let state = new_run(1);

        assert_eq!(state.phase, RunPhase::Running);
        assert!(state.body.on_ground_surface());
        assert_eq!(state.speed, 100.0);
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn test_score_is_distance_plus_stars() {
        let mut state = new_run(1);
        state.body.position.x = 250.7;
        state.stats.stars = 320;

        assert_eq!(state.whole_distance(), 250);
        assert_eq!(state.score(), 570);
    }

    #[test]
    fn test_finish_freezes_once() {
        let mut state = new_run(1);
        state.body.position.x = 42.0;
        state.elapsed_secs = 1.5;

        let summary = state.finish(GameOverCause::Fell);
        assert!(state.is_ended());
        assert_eq!(summary.final_score, 42);
        assert_eq!(summary.survival_ms, 1500);

        state.body.position.x = 99.0;
        assert_eq!(state.finish(GameOverCause::Obstacle(ObstacleKind::Pothole)), summary);

        let events = state.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].data, GameEventData::GameOver { cause: GameOverCause::Fell, .. }));
    }

    #[test]
    fn test_run_state_determinism() {
        let state1 = new_run(12345);
        let state2 = new_run(12345);
        assert_eq!(state1.compute_hash(), state2.compute_hash());

        let state3 = new_run(54321);
        assert_ne!(state1.compute_hash(), state3.compute_hash());
    }
}
