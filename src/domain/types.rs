// Domain-level simulation primitives shared by every state.

use serde::{Deserialize, Serialize};

/// Discrete simulation step counter.
pub type Tick = u64;

/// Identifier of a logical entity, shared by its records in every state.
pub type EntityId = u64;

/// Fixed-point world position or velocity.
///
/// Integer math keeps every state bit-for-bit deterministic, which is what
/// allows two states to converge after a rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: Point) -> Point {
        Point {
            x: self.x.wrapping_add(by.x),
            y: self.y.wrapping_add(by.y),
        }
    }

    pub fn distance_sq(self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }
}

/// Physics state of one entity at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub pos: Point,
    pub vel: Point,
    /// Map bounces taken so far (projectiles only).
    #[serde(default)]
    pub bounces: u32,
}

impl Sample {
    pub const fn new(pos: Point, vel: Point) -> Self {
        Self {
            pos,
            vel,
            bounces: 0,
        }
    }
}

/// Selects the dead-reckoning step used for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    Ship,
    Projectile {
        owner: EntityId,
        max_bounces: u32,
        expires_at: Tick,
    },
}

impl EntityKind {
    pub fn is_ship(&self) -> bool {
        matches!(self, EntityKind::Ship)
    }

    // Ships are simulated before projectiles within the same tick.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            EntityKind::Ship => 0,
            EntityKind::Projectile { .. } => 1,
        }
    }
}

/// Authoritative position of an entity at an origin tick, decoded from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeUpdate {
    pub entity: EntityId,
    pub tick: Tick,
    pub pos: Point,
    pub vel: Point,
    /// Confirmed move of a directly controlled ship.
    pub direct: bool,
}

/// Fully decoded input handed to the simulation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimInput {
    Update(AuthoritativeUpdate),
    Spawn {
        entity: EntityId,
        kind: EntityKind,
        tick: Tick,
        pos: Point,
        vel: Point,
    },
    Remove {
        entity: EntityId,
        tick: Tick,
    },
}

impl SimInput {
    pub fn tick(&self) -> Tick {
        match self {
            SimInput::Update(update) => update.tick,
            SimInput::Spawn { tick, .. } | SimInput::Remove { tick, .. } => *tick,
        }
    }

    pub fn entity(&self) -> EntityId {
        match self {
            SimInput::Update(update) => update.entity,
            SimInput::Spawn { entity, .. } | SimInput::Remove { entity, .. } => *entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(arithmetic_overflow)]
    fn when_points_are_far_apart_then_distance_does_not_overflow() {
        let a = Point::new(i32::MIN, 0);
        let b = Point::new(i32::MAX, 0);

        assert_eq!(a.distance_sq(b), (u32::MAX as i64) * (u32::MAX as i64));
    }

    #[test]
    fn when_input_is_deserialized_then_tagged_variant_is_selected() {
        let input: SimInput = serde_json::from_value(serde_json::json!({
            "type": "spawn",
            "entity": 7,
            "kind": { "type": "ship" },
            "tick": 12,
            "pos": { "x": 1, "y": 2 },
            "vel": { "x": 0, "y": 0 }
        }))
        .expect("spawn input should deserialize");

        assert_eq!(input.tick(), 12);
        assert_eq!(input.entity(), 7);
    }
}
