// Framework bootstrap for the simulation runtime.

use crate::domain::tuning::render::RenderTuning;
use crate::domain::{
    CollisionMap, EntityId, LadderSettings, RenderDelays, RenderFrame, SettingsError, StateLadder,
    TrackerChange,
};
use crate::frameworks::config;
use crate::use_cases::{SimEvent, Simulation, simulation_task};
use std::sync::Arc;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

/// Loads `.env` and installs the global tracing subscriber.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };
    if installed.is_err() {
        return;
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Channels of a running simulation task.
pub struct SimulationHandle {
    /// Sender for decoded inputs into the simulation task.
    pub input_tx: mpsc::Sender<SimEvent>,
    /// Watch sender holding the latest rendered frame.
    pub frame_tx: watch::Sender<RenderFrame>,
    /// Broadcast sender for effect spawn/retract changes.
    pub effects_tx: broadcast::Sender<TrackerChange>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    pub fn frames(&self) -> watch::Receiver<RenderFrame> {
        self.frame_tx.subscribe()
    }

    pub fn effects(&self) -> broadcast::Receiver<TrackerChange> {
        self.effects_tx.subscribe()
    }

    /// Stops the simulation task and waits for it to exit.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.shutdown.notify_one();
        self.task.await
    }
}

/// Builds a state ladder and spawns its simulation task on the current runtime.
pub fn spawn_simulation(
    settings: LadderSettings,
    map: impl CollisionMap + 'static,
    render: RenderTuning,
    viewer: Option<EntityId>,
) -> Result<SimulationHandle, SettingsError> {
    let ladder = StateLadder::new(settings, map)?;
    let sim = Simulation::new(ladder, RenderDelays::new(viewer, render), config::RENDER_STATE);

    // Channel wiring for the simulation loop.
    let (input_tx, input_rx) = mpsc::channel::<SimEvent>(config::INPUT_CHANNEL_CAPACITY);
    let (frame_tx, _frame_rx) = watch::channel::<RenderFrame>(RenderFrame::default());
    let (effects_tx, _effects_rx) =
        broadcast::channel::<TrackerChange>(config::EFFECT_BROADCAST_CAPACITY);
    let shutdown = Arc::new(Notify::new());

    let task = tokio::spawn(simulation_task(
        input_rx,
        frame_tx.clone(),
        effects_tx.clone(),
        config::tick_interval(),
        shutdown.clone(),
        sim,
    ));

    Ok(SimulationHandle {
        input_tx,
        frame_tx,
        effects_tx,
        shutdown,
        task,
    })
}

/// Like [`spawn_simulation`], with the ladder shape read from the environment.
pub fn spawn_from_env(
    map: impl CollisionMap + 'static,
    viewer: Option<EntityId>,
) -> Result<SimulationHandle, SettingsError> {
    let settings = config::ladder_settings();
    tracing::debug!(
        delays = ?settings.delays,
        history_length = settings.history_length,
        "ladder settings from environment"
    );
    spawn_simulation(settings, map, RenderTuning::default(), viewer)
}
