//! Level Director
//!
//! Procedural spawning of rails and obstacles ahead of the camera, and the
//! distance-based difficulty ramp that drives spawn weights, spawn gaps and
//! world speed.
//!
//! Everything here is a pure function of scroll distance plus the run's
//! seeded RNG, so a level replays identically from its seed.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;
use crate::game::collision::Aabb;
use crate::game::error::SimError;
use crate::game::rail::{RailId, RailSegment};

// =============================================================================
// OBSTACLES
// =============================================================================

/// Handle of an obstacle in the director's registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

/// Hazard types. Touching any of them ends the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObstacleKind {
    /// Hole in the road
    Pothole = 0,
    /// Low wooden block
    WoodBlock = 1,
    /// Traffic cone lying on its side
    KnockedCone = 2,
    /// Tall road barricade
    Barricade = 3,
}

impl ObstacleKind {
    /// Hitbox (width, height) for this kind.
    pub fn size(self) -> (f32, f32) {
        match self {
            ObstacleKind::Pothole => (28.0, 12.0),
            ObstacleKind::WoodBlock => (16.0, 14.0),
            ObstacleKind::KnockedCone => (18.0, 8.0),
            ObstacleKind::Barricade => (12.0, 28.0),
        }
    }
}

/// A placed obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    /// Left edge
    pub x: f32,
    /// Hazard type
    pub kind: ObstacleKind,
    hitbox: Aabb,
}

impl ObstacleSpec {
    /// Place an obstacle of `kind` with its left edge at `x`.
    ///
    /// Potholes sink below the ground line; everything else stands on it.
    pub fn new(x: f32, kind: ObstacleKind, ground_y: f32) -> Self {
        let (width, height) = kind.size();
        let top = match kind {
            ObstacleKind::Pothole => ground_y - 2.0,
            _ => ground_y - height,
        };
        Self {
            x,
            kind,
            hitbox: Aabb::from_origin_size(x, top, width, height),
        }
    }

    /// Collision box in world space.
    #[inline]
    pub fn hitbox(&self) -> Aabb {
        self.hitbox
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.hitbox.max.x
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// What a single spawn draw produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    /// A chain of abutting rail segments
    Rail,
    /// A single hazard
    Obstacle(ObstacleKind),
}

/// Draw weight of one candidate at minimum and maximum difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnWeight {
    /// Candidate
    pub kind: SpawnKind,
    /// Weight at difficulty 0
    pub easy: f32,
    /// Weight at difficulty 1
    pub hard: f32,
}

impl SpawnWeight {
    const fn new(kind: SpawnKind, easy: f32, hard: f32) -> Self {
        Self { kind, easy, hard }
    }
}

/// Tuning for the level director.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Scroll distance at which difficulty reaches 1
    pub ramp_distance: f32,
    /// World speed at difficulty 0 (units/s)
    pub base_speed: f32,
    /// World speed at difficulty 1 (units/s)
    pub max_speed: f32,
    /// Visible width of the play field
    pub view_width: f32,
    /// Extra distance beyond the view kept populated
    pub lookahead_margin: f32,
    /// Spawn gap range at difficulty 0
    pub easy_gap: (f32, f32),
    /// Spawn gap range at difficulty 1
    pub hard_gap: (f32, f32),
    /// Scroll distance of the first spawn (empty runway before it)
    pub first_spawn_distance: f32,
    /// Spawns this far behind the camera are removed
    pub despawn_margin: f32,
    /// Rail centerline height above the ground
    pub rail_height: f32,
    /// Width of one rail segment
    pub rail_segment_width: f32,
    /// Max segments in one rail chain
    pub max_rail_chain: u32,
    /// Candidate weights
    pub weights: Vec<SpawnWeight>,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            ramp_distance: 3500.0,
            base_speed: 100.0,
            max_speed: 180.0,
            view_width: 400.0,
            lookahead_margin: 200.0,
            easy_gap: (240.0, 360.0),
            hard_gap: (120.0, 180.0),
            first_spawn_distance: 400.0,
            despawn_margin: 240.0,
            rail_height: 36.0,
            rail_segment_width: 32.0,
            max_rail_chain: 3,
            weights: vec![
                SpawnWeight::new(SpawnKind::Rail, 30.0, 14.0),
                SpawnWeight::new(SpawnKind::Obstacle(ObstacleKind::Pothole), 18.0, 24.0),
                SpawnWeight::new(SpawnKind::Obstacle(ObstacleKind::WoodBlock), 20.0, 22.0),
                SpawnWeight::new(SpawnKind::Obstacle(ObstacleKind::KnockedCone), 18.0, 20.0),
                SpawnWeight::new(SpawnKind::Obstacle(ObstacleKind::Barricade), 14.0, 20.0),
            ],
        }
    }
}

impl DirectorConfig {
    /// Reject values that break the director's guarantees.
    ///
    /// Zero total weight is left to [`LevelDirector::maintain`], which
    /// reports it as spawn starvation.
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(format!("{name} must be positive, got {v}")))
            }
        };

        positive("ramp_distance", self.ramp_distance)?;
        positive("base_speed", self.base_speed)?;
        positive("view_width", self.view_width)?;
        positive("rail_segment_width", self.rail_segment_width)?;

        if !(self.max_speed.is_finite() && self.max_speed >= self.base_speed) {
            return Err(SimError::InvalidConfig(format!(
                "max_speed {} below base_speed {}",
                self.max_speed, self.base_speed
            )));
        }
        if self.max_rail_chain == 0 {
            return Err(SimError::InvalidConfig("max_rail_chain must be at least 1".into()));
        }
        if let Some(w) = self
            .weights
            .iter()
            .find(|w| !(w.easy.is_finite() && w.hard.is_finite() && w.easy >= 0.0 && w.hard >= 0.0))
        {
            return Err(SimError::InvalidConfig(format!("bad weight for {:?}", w.kind)));
        }

        Ok(())
    }

    /// Distance past the camera that must stay populated.
    #[inline]
    pub fn lookahead(&self) -> f32 {
        self.view_width + self.lookahead_margin
    }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

/// `min(1, scroll_x / ramp_distance)`, clamped at 0 for negative scroll.
#[inline]
pub fn difficulty(scroll_x: f32, ramp_distance: f32) -> f32 {
    if ramp_distance <= 0.0 {
        return 1.0;
    }
    (scroll_x.max(0.0) / ramp_distance).min(1.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// =============================================================================
// DIRECTOR
// =============================================================================

/// Owns the spawn registries and the spawn frontier.
///
/// The frontier and `scroll_x` are distances from the run's start; spawns
/// are placed in world space at `origin_x + frontier`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDirector {
    config: DirectorConfig,
    origin_x: f32,
    ground_y: f32,
    frontier: f32,
    next_id: u32,
    rails: BTreeMap<RailId, RailSegment>,
    obstacles: BTreeMap<ObstacleId, ObstacleSpec>,
}

impl LevelDirector {
    /// Create a director for a run starting at `origin_x`.
    pub fn new(config: DirectorConfig, origin_x: f32, ground_y: f32) -> Self {
        let frontier = config.first_spawn_distance;
        Self {
            config,
            origin_x,
            ground_y,
            frontier,
            next_id: 0,
            rails: BTreeMap::new(),
            obstacles: BTreeMap::new(),
        }
    }

    /// Tuning in effect.
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Current difficulty in [0, 1].
    #[inline]
    pub fn difficulty(&self, scroll_x: f32) -> f32 {
        difficulty(scroll_x, self.config.ramp_distance)
    }

    /// World scroll speed at `scroll_x` (units/s).
    #[inline]
    pub fn speed_at(&self, scroll_x: f32) -> f32 {
        lerp(self.config.base_speed, self.config.max_speed, self.difficulty(scroll_x))
    }

    /// Spawn gap bounds at `scroll_x`.
    pub fn gap_range(&self, scroll_x: f32) -> (f32, f32) {
        let d = self.difficulty(scroll_x);
        (
            lerp(self.config.easy_gap.0, self.config.hard_gap.0, d),
            lerp(self.config.easy_gap.1, self.config.hard_gap.1, d),
        )
    }

    /// Candidate weights at `scroll_x`.
    pub fn weights_at(&self, scroll_x: f32) -> Vec<(SpawnKind, f32)> {
        let d = self.difficulty(scroll_x);
        self.config
            .weights
            .iter()
            .map(|w| (w.kind, lerp(w.easy, w.hard, d).max(0.0)))
            .collect()
    }

    /// Weighted draw over the candidate set by cumulative weight.
    pub fn pick_spawn(&self, scroll_x: f32, rng: &mut DeterministicRng) -> Result<SpawnKind, SimError> {
        let weights = self.weights_at(scroll_x);
        let total: f32 = weights.iter().map(|(_, w)| w).sum();

        if !(total.is_finite() && total > 0.0) {
            return Err(SimError::SpawnStarvation {
                scroll_x,
                reason: format!("total spawn weight is {total}"),
            });
        }

        let mut roll = rng.next_unit() * total;
        for (kind, weight) in &weights {
            if roll < *weight {
                return Ok(*kind);
            }
            roll -= weight;
        }

        // Rounding left the roll just past the last bucket
        weights
            .iter()
            .rev()
            .find(|(_, w)| *w > 0.0)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| SimError::SpawnStarvation {
                scroll_x,
                reason: "no candidate with positive weight".into(),
            })
    }

    /// Uniform gap draw within [`Self::gap_range`].
    pub fn sample_gap(&self, scroll_x: f32, rng: &mut DeterministicRng) -> Result<f32, SimError> {
        let (min, max) = self.gap_range(scroll_x);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && max >= min) {
            return Err(SimError::SpawnStarvation {
                scroll_x,
                reason: format!("gap range {min}..{max} cannot advance the frontier"),
            });
        }
        Ok(rng.next_f32_range(min, max))
    }

    /// Fill the lookahead window.
    ///
    /// On success `frontier >= scroll_x + lookahead`. Returns the number of
    /// spawn draws made.
    pub fn maintain(&mut self, scroll_x: f32, rng: &mut DeterministicRng) -> Result<u32, SimError> {
        let target = scroll_x + self.config.lookahead();
        let mut draws = 0;

        while self.frontier < target {
            let kind = self.pick_spawn(scroll_x, rng)?;
            let gap = self.sample_gap(scroll_x, rng)?;
            let next = self.frontier + gap;
            if next <= self.frontier {
                return Err(SimError::SpawnStarvation {
                    scroll_x,
                    reason: format!("gap {gap} vanishes at frontier {}", self.frontier),
                });
            }
            let x = self.origin_x + self.frontier;

            self.spawn(kind, x, rng);
            self.frontier = next;
            draws += 1;
        }

        if draws > 0 {
            debug!(scroll_x, frontier = self.frontier, draws, "spawn window refilled");
        }

        Ok(draws)
    }

    fn spawn(&mut self, kind: SpawnKind, x: f32, rng: &mut DeterministicRng) {
        match kind {
            SpawnKind::Rail => {
                let segments = rng.next_count(1, self.config.max_rail_chain);
                let y = self.ground_y - self.config.rail_height;
                let width = self.config.rail_segment_width;
                let mut segment_x = x;
                for _ in 0..segments {
                    self.insert_rail(RailSegment::new(segment_x, y, width));
                    segment_x += width;
                }
            }
            SpawnKind::Obstacle(obstacle) => {
                self.insert_obstacle(ObstacleSpec::new(x, obstacle, self.ground_y));
            }
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a rail segment.
    pub fn insert_rail(&mut self, segment: RailSegment) -> RailId {
        let id = RailId(self.allocate_id());
        self.rails.insert(id, segment);
        id
    }

    /// Register an obstacle.
    pub fn insert_obstacle(&mut self, obstacle: ObstacleSpec) -> ObstacleId {
        let id = ObstacleId(self.allocate_id());
        self.obstacles.insert(id, obstacle);
        id
    }

    /// Drop spawns that scrolled out far behind the camera.
    ///
    /// Returns the number removed.
    pub fn despawn_behind(&mut self, scroll_x: f32) -> usize {
        let cutoff = self.origin_x + scroll_x - self.config.despawn_margin;
        let before = self.rails.len() + self.obstacles.len();

        self.rails.retain(|_, rail| rail.right() >= cutoff);
        self.obstacles.retain(|_, obstacle| obstacle.right() >= cutoff);

        before - (self.rails.len() + self.obstacles.len())
    }

    /// Live rail segments.
    pub fn rails(&self) -> &BTreeMap<RailId, RailSegment> {
        &self.rails
    }

    /// Live obstacles.
    pub fn obstacles(&self) -> &BTreeMap<ObstacleId, ObstacleSpec> {
        &self.obstacles
    }

    /// Spawn frontier (distance from the run's start).
    pub fn frontier(&self) -> f32 {
        self.frontier
    }

    /// Hash registries and frontier.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_f32(self.frontier);
        hasher.update_u32(self.next_id);

        hasher.update_u32(self.rails.len() as u32);
        for (id, rail) in &self.rails {
            hasher.update_u32(id.0);
            hasher.update_f32(rail.x);
            hasher.update_f32(rail.y);
            hasher.update_f32(rail.width);
        }

        hasher.update_u32(self.obstacles.len() as u32);
        for (id, obstacle) in &self.obstacles {
            hasher.update_u32(id.0);
            hasher.update_u8(obstacle.kind as u8);
            hasher.update_f32(obstacle.x);
        }
    }
}
