use super::types::{SimEvent, StepOutput};
use crate::domain::{EventTracker, RenderDelays, RenderFrame, StateLadder, TrackerChange};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info};

/// Synchronous core of the simulation loop.
///
/// Owns the ladder, the render delays of one local viewer and the effect
/// tracker of the state that viewer is rendered from.
pub struct Simulation {
    ladder: StateLadder,
    render: RenderDelays,
    tracker: EventTracker,
}

impl Simulation {
    pub fn new(ladder: StateLadder, render: RenderDelays, render_state: usize) -> Self {
        Self {
            ladder,
            render,
            tracker: EventTracker::new(render_state),
        }
    }

    pub fn ladder(&self) -> &StateLadder {
        &self.ladder
    }

    pub fn render_delays(&self) -> &RenderDelays {
        &self.render
    }

    pub fn render_state(&self) -> usize {
        self.tracker.state()
    }

    pub fn handle(&mut self, event: SimEvent) {
        match event {
            SimEvent::Input(input) => self.ladder.apply(input),
            SimEvent::Fire {
                entity,
                owner,
                tick,
                pos,
                vel,
            } => self.ladder.fire(entity, owner, tick, pos, vel),
            SimEvent::SetViewer { entity } => {
                info!(?entity, "viewer changed");
                self.render.set_viewer(entity);
            }
        }
    }

    /// Ticks the ladder once, collects garbage and renders the frame.
    pub fn step(&mut self) -> StepOutput {
        let resimulated = self.ladder.tick();
        self.ladder.collect_garbage();
        let effects = self.tracker.poll(self.ladder.events());
        let frame = self.render.evaluate(&self.ladder, self.tracker.state());
        StepOutput {
            frame,
            effects,
            resimulated,
        }
    }
}

pub async fn simulation_task(
    mut input_rx: mpsc::Receiver<SimEvent>,
    frame_tx: watch::Sender<RenderFrame>,
    effects_tx: broadcast::Sender<TrackerChange>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
    mut sim: Simulation,
) {
    // Drive the fixed-step loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    info!(
        lead_tick = sim.ladder().lead_tick(),
        tick_interval_ms = tick_interval.as_millis(),
        "simulation started"
    );

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        // Hand every decoded input to the ladder before the step runs.
        let mut drained = 0usize;
        while let Ok(event) = input_rx.try_recv() {
            sim.handle(event);
            drained += 1;
        }

        let output = sim.step();
        if drained > 0 || output.resimulated > 0 {
            debug!(
                lead_tick = sim.ladder().lead_tick(),
                drained,
                resimulated = output.resimulated,
                "simulation step"
            );
        }

        for change in output.effects {
            // No subscribers is fine; effects are best effort.
            let _ = effects_tx.send(change);
        }
        let _ = frame_tx.send(output.frame);
    }

    info!(lead_tick = sim.ladder().lead_tick(), "simulation stopped");
}
