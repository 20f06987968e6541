// Per-kind dead reckoning, selected by the entity kind tag.

pub mod projectiles;
pub mod ship_movement;

use crate::domain::map::CollisionMap;
use crate::domain::tuning::projectile::ProjectileTuning;
use crate::domain::tuning::ship::ShipTuning;
use crate::domain::types::{EntityId, EntityKind, Point, Sample, Tick};
use projectiles::{Explosion, ProjectileConfig};

/// Read-only collaborators of a dead-reckoning step.
#[derive(Clone, Copy)]
pub struct SimContext<'a> {
    pub map: &'a dyn CollisionMap,
    pub ship: &'a ShipTuning,
    pub projectile: &'a ProjectileTuning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub sample: Sample,
    pub explosion: Option<Explosion>,
}

/// Computes the sample at `tick` from the sample at `tick - 1`.
pub fn perform_dead_reckoning(
    kind: EntityKind,
    tick: Tick,
    prev: Sample,
    ships: &[(EntityId, Point)],
    ctx: SimContext<'_>,
) -> Step {
    match kind {
        EntityKind::Ship => Step {
            sample: ship_movement::dead_reckon(prev, ctx.ship, ctx.map),
            explosion: None,
        },
        EntityKind::Projectile {
            owner,
            max_bounces,
            expires_at,
        } => {
            let cfg = ProjectileConfig {
                owner,
                max_bounces,
                expires_at,
                radius: ctx.projectile.hit_radius,
                ship_radius: ctx.ship.radius,
            };
            projectiles::dead_reckon(prev, tick, cfg, ships, ctx.map)
        }
    }
}
