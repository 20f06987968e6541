use crate::domain::{LadderSettings, Tick};
use std::{env, time::Duration};

// Runtime constants and environment overrides (not gameplay tuning).

pub fn trailing_delays() -> Vec<Tick> {
    env::var("SIM_TRAILING_DELAYS")
        .ok()
        .and_then(|value| parse_delays(&value))
        .unwrap_or_else(|| vec![0, 8, 32])
}

pub fn history_length() -> usize {
    env::var("SIM_HISTORY_LENGTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(128)
}

pub fn tick_interval() -> Duration {
    let millis = env::var("SIM_TICK_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(16);
    Duration::from_millis(millis)
}

/// Ladder shape from the environment, with default gameplay tuning.
pub fn ladder_settings() -> LadderSettings {
    LadderSettings {
        delays: trailing_delays(),
        history_length: history_length(),
        ..LadderSettings::default()
    }
}

fn parse_delays(value: &str) -> Option<Vec<Tick>> {
    value
        .split(',')
        .map(|delay| delay.trim().parse().ok())
        .collect()
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const EFFECT_BROADCAST_CAPACITY: usize = 128;

// State whose frame is rendered for the local viewer.
pub const RENDER_STATE: usize = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_delays_are_comma_separated_then_they_parse_in_order() {
        assert_eq!(parse_delays("0, 8,32"), Some(vec![0, 8, 32]));
        assert_eq!(parse_delays("0,x"), None);
        assert_eq!(parse_delays(""), None);
    }
}
