// Shared builders for integration tests.
#![allow(dead_code)]

use timewarp_sim::domain::tuning::projectile::ProjectileTuning;
use timewarp_sim::domain::tuning::ship::ShipTuning;
use timewarp_sim::domain::{
    AuthoritativeUpdate, CollisionMap, EntityId, EntityKind, LadderSettings, Point, SimInput,
    StateLadder, Tick,
};

// Frictionless ships keep expected positions easy to compute by hand.
pub fn settings(delays: &[Tick], history_length: usize) -> LadderSettings {
    LadderSettings {
        delays: delays.to_vec(),
        history_length,
        initial_tick: 0,
        ship: ShipTuning {
            friction: 0,
            radius: 10,
        },
        projectile: ProjectileTuning {
            hit_radius: 2,
            lifetime: 1_000,
            max_bounces: 0,
        },
    }
}

pub fn ladder(delays: &[Tick], history_length: usize, map: impl CollisionMap + 'static) -> StateLadder {
    StateLadder::new(settings(delays, history_length), map).expect("test settings should be valid")
}

pub fn ship(entity: EntityId, tick: Tick, pos: Point, vel: Point) -> SimInput {
    SimInput::Spawn {
        entity,
        kind: EntityKind::Ship,
        tick,
        pos,
        vel,
    }
}

pub fn projectile(entity: EntityId, owner: EntityId, max_bounces: u32, pos: Point, vel: Point) -> SimInput {
    SimInput::Spawn {
        entity,
        kind: EntityKind::Projectile {
            owner,
            max_bounces,
            expires_at: 1_000,
        },
        tick: 0,
        pos,
        vel,
    }
}

pub fn update(entity: EntityId, tick: Tick, pos: Point, vel: Point, direct: bool) -> SimInput {
    SimInput::Update(AuthoritativeUpdate {
        entity,
        tick,
        pos,
        vel,
        direct,
    })
}

pub fn run(ladder: &mut StateLadder, ticks: usize) {
    for _ in 0..ticks {
        ladder.tick();
        ladder.collect_garbage();
    }
}
