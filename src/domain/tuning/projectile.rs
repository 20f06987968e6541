use crate::domain::types::{EntityId, EntityKind, Tick};
use serde::{Deserialize, Serialize};

/// Gameplay tuning for projectiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProjectileTuning {
    /// World-space collision radius.
    pub hit_radius: i32,

    /// Lifetime in ticks before the projectile explodes on its own.
    pub lifetime: Tick,

    /// Wall bounces before the next wall hit explodes the projectile.
    pub max_bounces: u32,
}

impl ProjectileTuning {
    /// Kind of a projectile fired by `owner` at `tick`.
    pub fn kind(&self, owner: EntityId, tick: Tick) -> EntityKind {
        EntityKind::Projectile {
            owner,
            max_bounces: self.max_bounces,
            expires_at: tick + self.lifetime,
        }
    }
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            hit_radius: 5 * 1024,
            lifetime: 75,
            max_bounces: 0,
        }
    }
}
