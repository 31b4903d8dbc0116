use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator settings, the `[workflow]` section of `folio.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// How long a chapter waits in human review before proceeding without feedback.
    #[serde(default = "default_feedback_timeout_secs")]
    pub feedback_timeout_secs: u64,
    /// Review ratings below this trigger one extra pipeline pass.
    #[serde(default = "default_rerun_rating_threshold")]
    pub rerun_rating_threshold: f64,
    /// Buffer size of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Pause between consecutive chapter fetches.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,
    #[serde(default = "default_temperature_step")]
    pub temperature_step: f32,
    #[serde(default = "default_temperature_cap")]
    pub temperature_cap: f32,
    /// Agents whose mean reward falls below this get a hotter temperature.
    #[serde(default = "default_low_reward_threshold")]
    pub low_reward_threshold: f64,
}

fn default_feedback_timeout_secs() -> u64 {
    30
}

fn default_rerun_rating_threshold() -> f64 {
    7.0
}

fn default_event_capacity() -> usize {
    256
}

fn default_fetch_delay_ms() -> u64 {
    1000
}

fn default_temperature_step() -> f32 {
    0.1
}

fn default_temperature_cap() -> f32 {
    1.0
}

fn default_low_reward_threshold() -> f64 {
    50.0
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            feedback_timeout_secs: default_feedback_timeout_secs(),
            rerun_rating_threshold: default_rerun_rating_threshold(),
            event_capacity: default_event_capacity(),
            fetch_delay_ms: default_fetch_delay_ms(),
            temperature_step: default_temperature_step(),
            temperature_cap: default_temperature_cap(),
            low_reward_threshold: default_low_reward_threshold(),
        }
    }
}

impl WorkflowConfig {
    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_secs(self.feedback_timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: WorkflowConfig = toml::from_str("feedback_timeout_secs = 5\nfetch_delay_ms = 0").unwrap();
        assert_eq!(cfg.feedback_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.fetch_delay(), Duration::ZERO);
        assert_eq!(cfg.rerun_rating_threshold, 7.0);
        assert_eq!(cfg.low_reward_threshold, 50.0);
        assert!((cfg.temperature_step - 0.1).abs() < f32::EPSILON);
    }
}
