//! Collision Detection
//!
//! Axis-aligned boxes for the player, rails and obstacles.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::level::{ObstacleId, ObstacleSpec};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Top-left corner
    pub min: Vec2,
    /// Bottom-right corner
    pub max: Vec2,
}

impl Aabb {
    /// Create from corners.
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create from top-left corner and size.
    #[inline]
    pub fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    /// Width of the box.
    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height of the box.
    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Check if two boxes overlap.
    ///
    /// Boxes that only share an edge do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Find the first obstacle the player box overlaps.
///
/// Obstacles are visited in id order, so the reported hit is stable.
pub fn first_obstacle_hit<'a, I>(player: &Aabb, obstacles: I) -> Option<(ObstacleId, &'a ObstacleSpec)>
where
    I: IntoIterator<Item = (&'a ObstacleId, &'a ObstacleSpec)>,
{
    obstacles
        .into_iter()
        .find(|(_, obstacle)| player.overlaps(&obstacle.hitbox()))
        .map(|(id, obstacle)| (*id, obstacle))
}
