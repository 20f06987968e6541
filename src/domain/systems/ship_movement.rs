use crate::domain::map::{CollisionMap, reflect};
use crate::domain::tuning::ship::ShipTuning;
use crate::domain::types::{Point, Sample};

/// Extrapolates a ship one tick from its previous sample.
pub fn dead_reckon(prev: Sample, tuning: &ShipTuning, map: &dyn CollisionMap) -> Sample {
    let mut vel = prev.vel;

    // position integrate, bouncing off walls
    let mut pos = prev.pos.offset(vel);
    if let Some(normal) = map.collides(pos) {
        vel = reflect(vel, normal);
        pos = prev.pos.offset(vel);
        if map.collides(pos).is_some() {
            pos = prev.pos;
        }
    }

    Sample {
        pos,
        vel: apply_friction(vel, tuning.friction),
        bounces: prev.bounces,
    }
}

fn apply_friction(vel: Point, friction: u32) -> Point {
    let keep = 1024 - i64::from(friction.min(1024));
    Point {
        x: (i64::from(vel.x) * keep / 1024) as i32,
        y: (i64::from(vel.y) * keep / 1024) as i32,
    }
}
