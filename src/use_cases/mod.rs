// Use cases layer: the fixed-step loop driving the state ladder.

pub mod simulation;
pub mod types;

pub use simulation::{Simulation, simulation_task};
pub use types::{SimEvent, StepOutput};
