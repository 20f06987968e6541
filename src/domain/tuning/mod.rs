// Gameplay tuning, passed into the simulation as already-resolved values.

pub mod projectile;
pub mod render;
pub mod ship;
