use crate::domain::map::{CollisionMap, reflect};
use crate::domain::types::{EntityId, Point, Sample, Tick};
use super::Step;

#[derive(Debug, Clone, Copy)]
pub struct ProjectileConfig {
    pub owner: EntityId,
    pub max_bounces: u32,
    pub expires_at: Tick,
    pub radius: i32,
    pub ship_radius: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionCause {
    Expired,
    HitWall,
    HitShip(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Explosion {
    pub cause: ExplosionCause,
    pub pos: Point,
}

/// Extrapolates a projectile to `tick`, checking walls, lifetime and ships.
///
/// `ships` holds the positions of the live ships at `tick` in the same state.
pub fn dead_reckon(
    prev: Sample,
    tick: Tick,
    cfg: ProjectileConfig,
    ships: &[(EntityId, Point)],
    map: &dyn CollisionMap,
) -> Step {
    if tick >= cfg.expires_at {
        return exploded(prev, ExplosionCause::Expired, prev.pos);
    }

    let mut next = Sample {
        pos: prev.pos.offset(prev.vel),
        ..prev
    };
    if let Some(normal) = map.collides(next.pos) {
        if prev.bounces >= cfg.max_bounces {
            return exploded(prev, ExplosionCause::HitWall, prev.pos);
        }
        next.vel = reflect(prev.vel, normal);
        next.pos = prev.pos.offset(next.vel);
        next.bounces = prev.bounces + 1;
    }

    // Projectile vs ship collision (naive O(E) per projectile).
    let hit_radius = i64::from(cfg.ship_radius) + i64::from(cfg.radius);
    let hit_radius_sq = hit_radius * hit_radius;
    for &(ship, ship_pos) in ships {
        if ship == cfg.owner {
            continue;
        }
        if ship_pos.distance_sq(next.pos) <= hit_radius_sq {
            return exploded(next, ExplosionCause::HitShip(ship), next.pos);
        }
    }

    Step {
        sample: next,
        explosion: None,
    }
}

fn exploded(sample: Sample, cause: ExplosionCause, pos: Point) -> Step {
    Step {
        sample,
        explosion: Some(Explosion { cause, pos }),
    }
}
