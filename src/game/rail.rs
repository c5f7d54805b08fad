//! Rail Attachment
//!
//! Decides when the body is locked to a rail and when it falls freely.
//!
//! ```text
//!              jump / lookup miss
//!   Grinding ──────────────────────▶ Airborne ──── ground contact ───▶ Grounded
//!      ▲  │                           │   ▲                               │
//!      │  └─ chain to next segment    │   └────────────── jump ───────────┘
//!      └───────── rail overlap ───────┘
//! ```
//!
//! Rails are owned by the level director. The body only holds a [`RailId`],
//! so a rail that has been despawned is just a failed lookup.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::collision::Aabb;
use crate::game::physics::{MotionState, PlayerBody};

/// Handle of a rail in the director's registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RailId(pub u32);

/// One straight grindable rail segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RailSegment {
    /// Left end
    pub x: f32,
    /// Centerline height
    pub y: f32,
    /// Horizontal extent
    pub width: f32,
}

impl RailSegment {
    /// Create a segment.
    pub const fn new(x: f32, y: f32, width: f32) -> Self {
        Self { x, y, width }
    }

    /// Right end.
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Collision box for a rail of the given thickness.
    pub fn collider(&self, thickness: f32) -> Aabb {
        Aabb::from_origin_size(self.x, self.y - thickness / 2.0, self.width, thickness)
    }
}

/// Tuning for rail attachment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RailConfig {
    /// Feet are pinned this far above the rail's centerline
    pub snap_offset: f32,
    /// Collider thickness
    pub thickness: f32,
    /// How far past a segment's end the body may travel before chaining
    pub chain_tolerance: f32,
    /// Max height difference between chained segments
    pub chain_y_tolerance: f32,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            snap_offset: 2.0,
            thickness: 4.0,
            chain_tolerance: 4.0,
            chain_y_tolerance: 6.0,
        }
    }
}

/// Why a grind ended without a jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetachReason {
    /// Ran off the end with no successor in reach
    LookupMiss,
    /// The rail left the registry
    Despawned,
}

/// Transition reported by [`update_attachment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RailTransition {
    /// Airborne → Grinding
    Attached {
        /// Rail now being ground
        rail: RailId,
    },
    /// Seamless re-target onto the next segment
    Chained {
        /// Segment left behind
        from: RailId,
        /// Segment now being ground
        to: RailId,
    },
    /// Grinding → Airborne
    Detached {
        /// Rail that was left
        rail: RailId,
        /// Why
        reason: DetachReason,
    },
    /// Airborne → Grounded
    Landed,
}

/// Run the attachment state machine for one tick, after integration.
///
/// Rails are one-way: only a body moving down with its feet at or above
/// the rail's underside is caught. Rising through a rail, or brushing it
/// from below, leaves the body airborne.
pub fn update_attachment(
    body: &mut PlayerBody,
    rails: &BTreeMap<RailId, RailSegment>,
    config: &RailConfig,
    ground_y: f32,
) -> Option<RailTransition> {
    match body.motion {
        MotionState::Grinding { rail } => continue_grind(body, rail, rails, config),
        MotionState::Airborne => {
            if body.velocity.y >= 0.0 {
                if let Some((id, segment)) = find_catching_rail(body, rails, config) {
                    body.lock_to_rail(id, segment.y - config.snap_offset);
                    return Some(RailTransition::Attached { rail: id });
                }

                if body.position.y >= ground_y {
                    body.land_on_ground(ground_y);
                    return Some(RailTransition::Landed);
                }
            }
            None
        }
        MotionState::Grounded => {
            body.land_on_ground(ground_y);
            None
        }
    }
}

/// Re-pin to the current rail, chain to the next one, or let go.
fn continue_grind(
    body: &mut PlayerBody,
    rail: RailId,
    rails: &BTreeMap<RailId, RailSegment>,
    config: &RailConfig,
) -> Option<RailTransition> {
    let Some(segment) = rails.get(&rail) else {
        body.motion = MotionState::Airborne;
        return Some(RailTransition::Detached {
            rail,
            reason: DetachReason::Despawned,
        });
    };

    if body.position.x <= segment.right() + config.chain_tolerance {
        body.lock_to_rail(rail, segment.y - config.snap_offset);
        return None;
    }

    match find_successor(rails, rail, segment, body.position.x, config) {
        Some((next, next_segment)) => {
            body.lock_to_rail(next, next_segment.y - config.snap_offset);
            Some(RailTransition::Chained { from: rail, to: next })
        }
        None => {
            body.motion = MotionState::Airborne;
            Some(RailTransition::Detached {
                rail,
                reason: DetachReason::LookupMiss,
            })
        }
    }
}

/// First rail the descending body lands on.
///
/// Feet must not be deeper than one collider thickness below the
/// centerline, so a body falling past a rail's underside is not caught.
fn find_catching_rail<'a>(
    body: &PlayerBody,
    rails: &'a BTreeMap<RailId, RailSegment>,
    config: &RailConfig,
) -> Option<(RailId, &'a RailSegment)> {
    let hitbox = body.hitbox();
    let feet = body.position.y;

    rails
        .iter()
        .find(|(_, segment)| {
            feet <= segment.y + config.thickness && hitbox.overlaps(&segment.collider(config.thickness))
        })
        .map(|(id, segment)| (*id, segment))
}

/// Contiguous segment under `x` at roughly the same height.
pub fn find_successor<'a>(
    rails: &'a BTreeMap<RailId, RailSegment>,
    current_id: RailId,
    current: &RailSegment,
    x: f32,
    config: &RailConfig,
) -> Option<(RailId, &'a RailSegment)> {
    rails
        .iter()
        .filter(|(id, segment)| {
            **id != current_id
                && (segment.y - current.y).abs() <= config.chain_y_tolerance
                && segment.x <= current.right() + config.chain_tolerance
                && segment.x <= x + config.chain_tolerance
                && segment.right() > x
        })
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x))
        .map(|(id, segment)| (*id, segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::PhysicsConfig;

    const GROUND_Y: f32 = 200.0;
    const RAIL_Y: f32 = 164.0;

    fn chained_rails() -> BTreeMap<RailId, RailSegment> {
        let mut rails = BTreeMap::new();
        rails.insert(RailId(0), RailSegment::new(100.0, RAIL_Y, 32.0));
        rails.insert(RailId(1), RailSegment::new(132.0, RAIL_Y, 32.0));
        rails
    }

    fn falling_body_at(x: f32, feet_y: f32) -> PlayerBody {
        let mut body = PlayerBody::new(&PhysicsConfig::default());
        body.position.x = x;
        body.position.y = feet_y;
        body.velocity.y = 60.0;
        body.motion = MotionState::Airborne;
        body
    }

    #[test]
    fn test_attach_on_descending_overlap() {
        let rails = chained_rails();
        let config = RailConfig::default();
        let mut body = falling_body_at(110.0, 163.0);

        let transition = update_attachment(&mut body, &rails, &config, GROUND_Y);

        assert_eq!(transition, Some(RailTransition::Attached { rail: RailId(0) }));
        assert_eq!(body.position.y, RAIL_Y - config.snap_offset);
        assert_eq!(body.velocity.y, 0.0);
        assert_eq!(body.current_rail(), Some(RailId(0)));
    }

    #[test]
    fn test_no_attach_while_rising() {
        let rails = chained_rails();
        let mut body = falling_body_at(110.0, 163.0);
        body.velocity.y = -200.0;

        let transition = update_attachment(&mut body, &rails, &RailConfig::default(), GROUND_Y);

        assert_eq!(transition, None);
        assert_eq!(body.motion, MotionState::Airborne);
    }

    #[test]
    fn test_rail_underside_does_not_catch() {
        // Hitbox overlaps the rail but the feet are already below it
        let rails = chained_rails();
        let config = RailConfig::default();
        let mut body = falling_body_at(110.0, RAIL_Y + config.thickness + 12.0);
        assert!(body.hitbox().overlaps(&rails[&RailId(0)].collider(config.thickness)));

        let transition = update_attachment(&mut body, &rails, &config, GROUND_Y);

        assert_eq!(transition, None);
        assert_eq!(body.motion, MotionState::Airborne);
    }

    #[test]
    fn test_grind_chain_continuity() {
        let rails = chained_rails();
        let config = RailConfig::default();
        let mut body = falling_body_at(100.0, 163.0);

        assert!(matches!(
            update_attachment(&mut body, &rails, &config, GROUND_Y),
            Some(RailTransition::Attached { .. })
        ));

        let mut chained = false;
        let mut x = 100.0;
        while x < 150.0 {
            x += 2.0;
            body.position.x = x;
            match update_attachment(&mut body, &rails, &config, GROUND_Y) {
                Some(RailTransition::Chained { from, to }) => {
                    assert_eq!((from, to), (RailId(0), RailId(1)));
                    assert!(x > 132.0 + config.chain_tolerance);
                    chained = true;
                }
                None => {}
                other => panic!("unexpected transition at x={x}: {other:?}"),
            }
            assert!(body.is_rail_locked(), "airborne at x={x}");
        }

        assert!(chained);
        assert_eq!(body.current_rail(), Some(RailId(1)));
    }

    #[test]
    fn test_lookup_miss_detaches() {
        let mut rails = BTreeMap::new();
        rails.insert(RailId(0), RailSegment::new(100.0, RAIL_Y, 32.0));
        let config = RailConfig::default();

        let mut body = PlayerBody::new(&PhysicsConfig::default());
        body.lock_to_rail(RailId(0), RAIL_Y - 2.0);
        body.position.x = 137.0;

        let transition = update_attachment(&mut body, &rails, &config, GROUND_Y);

        assert_eq!(
            transition,
            Some(RailTransition::Detached { rail: RailId(0), reason: DetachReason::LookupMiss })
        );
        assert_eq!(body.motion, MotionState::Airborne);
    }

    #[test]
    fn test_gap_too_wide_does_not_chain() {
        let mut rails = BTreeMap::new();
        rails.insert(RailId(0), RailSegment::new(100.0, RAIL_Y, 32.0));
        rails.insert(RailId(1), RailSegment::new(160.0, RAIL_Y, 32.0));

        let mut body = PlayerBody::new(&PhysicsConfig::default());
        body.lock_to_rail(RailId(0), RAIL_Y - 2.0);
        body.position.x = 137.0;

        let transition = update_attachment(&mut body, &rails, &RailConfig::default(), GROUND_Y);
        assert!(matches!(transition, Some(RailTransition::Detached { .. })));
    }

    #[test]
    fn test_despawned_rail_detaches() {
        let rails = BTreeMap::new();
        let mut body = PlayerBody::new(&PhysicsConfig::default());
        body.lock_to_rail(RailId(9), RAIL_Y - 2.0);

        let transition = update_attachment(&mut body, &rails, &RailConfig::default(), GROUND_Y);

        assert_eq!(
            transition,
            Some(RailTransition::Detached { rail: RailId(9), reason: DetachReason::Despawned })
        );
    }

    #[test]
    fn test_landing_on_ground() {
        let rails = BTreeMap::new();
        let mut body = falling_body_at(10.0, 203.0);

        let transition = update_attachment(&mut body, &rails, &RailConfig::default(), GROUND_Y);

        assert_eq!(transition, Some(RailTransition::Landed));
        assert_eq!(body.position.y, GROUND_Y);
        assert!(body.on_ground_surface());
    }

    #[test]
    fn test_grinding_repins_height() {
        let rails = chained_rails();
        let mut body = PlayerBody::new(&PhysicsConfig::default());
        body.lock_to_rail(RailId(0), 150.0);
        body.position.x = 110.0;

        assert_eq!(update_attachment(&mut body, &rails, &RailConfig::default(), GROUND_Y), None);
        assert_eq!(body.position.y, RAIL_Y - 2.0);
    }
}
