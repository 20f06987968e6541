pub mod domain;
pub mod frameworks;
pub mod use_cases;

pub use frameworks::runtime::{SimulationHandle, init_runtime, spawn_simulation};
