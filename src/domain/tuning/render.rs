use crate::domain::types::Tick;
use serde::{Deserialize, Serialize};

/// Render-delay tuning for the local client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderTuning {
    /// Share of the move latency turned into delay, per mille.
    pub latency_factor: u64,

    /// Delay added on top of the latency share for controlled ships.
    pub fixed_delay: Tick,

    /// Ticks between single-tick adjustments of the rendered delay (0 applies immediately).
    pub update_every: Tick,

    /// Skip hysteresis and always follow the desired delay.
    pub maximize_local_time: bool,

    /// Upper bound of any rendered delay.
    pub highest_delay: Tick,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            latency_factor: 1000,
            fixed_delay: 0,
            update_every: 4,
            maximize_local_time: false,
            highest_delay: 32,
        }
    }
}
