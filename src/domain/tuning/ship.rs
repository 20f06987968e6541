use serde::{Deserialize, Serialize};

/// Gameplay tuning for ships.
///
/// Keep this separate from runtime configuration (state delays, tick rates, etc.).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShipTuning {
    /// Velocity lost per tick, in 1/1024ths.
    pub friction: u32,

    /// World-space collision radius (projectile hit checks).
    pub radius: i32,
}

impl Default for ShipTuning {
    fn default() -> Self {
        Self {
            friction: 8,
            radius: 24 * 1024,
        }
    }
}
