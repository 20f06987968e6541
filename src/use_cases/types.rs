// Use-case level inputs/outputs for the simulation loop.

use crate::domain::{EntityId, Point, RenderFrame, SimInput, Tick, TrackerChange};

#[derive(Debug, Clone)]
pub enum SimEvent {
    /// Decoded network input for the state ladder.
    Input(SimInput),
    /// Projectile fired by `owner`, shaped by the ladder's projectile tuning.
    Fire {
        entity: EntityId,
        owner: EntityId,
        tick: Tick,
        pos: Point,
        vel: Point,
    },
    /// Switches the entity the frame is rendered for.
    SetViewer { entity: Option<EntityId> },
}

/// Result of one fixed simulation step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub frame: RenderFrame,
    /// Effect changes for the rendered state since the previous step.
    pub effects: Vec<TrackerChange>,
    /// Number of entity paths recomputed during the step.
    pub resimulated: usize,
}
