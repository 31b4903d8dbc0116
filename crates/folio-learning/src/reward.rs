use crate::table::StateMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weights of the combined reward formula:
///
/// `quality·q + feedback·(fb·10) + latency·max(0, 100 − ms) − error·(err·50)`,
/// floored at 0 and capped at 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardWeights {
    #[serde(default = "default_quality")]
    pub quality: f64,
    #[serde(default = "default_feedback")]
    pub feedback: f64,
    #[serde(default = "default_latency")]
    pub latency: f64,
    #[serde(default = "default_error")]
    pub error: f64,
}

fn default_quality() -> f64 {
    0.4
}
fn default_feedback() -> f64 {
    0.3
}
fn default_latency() -> f64 {
    0.2
}
fn default_error() -> f64 {
    0.1
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            feedback: default_feedback(),
            latency: default_latency(),
            error: default_error(),
        }
    }
}

/// Raw heuristic inputs for one agent call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardSignals {
    /// Content-quality heuristic in `[0, 100]`.
    pub quality: f64,
    /// Mean human rating on `0..=10`, neutral 5 when none was given.
    pub feedback_score: f64,
    pub processing_ms: u64,
    /// Fraction of failed calls, `0.0` for a successful generation.
    pub error_rate: f64,
}

impl RewardWeights {
    /// Combine the signals into a scalar reward in `[0, 100]`.
    pub fn combine(&self, signals: &RewardSignals) -> f64 {
        let latency = (100.0 - signals.processing_ms as f64).max(0.0);
        let reward = self.quality * signals.quality
            + self.feedback * (signals.feedback_score * 10.0)
            + self.latency * latency
            - self.error * (signals.error_rate * 50.0);
        reward.clamp(0.0, 100.0)
    }
}

/// One reward event fed to the learner. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardObservation {
    pub id: Uuid,
    /// The chapter (or other item) the action was taken on.
    pub subject_id: Uuid,
    pub action: String,
    pub reward: f64,
    pub state: StateMap,
    pub next_state: StateMap,
    pub timestamp: DateTime<Utc>,
}

impl RewardObservation {
    pub fn new(
        subject_id: Uuid,
        action: impl Into<String>,
        reward: f64,
        state: StateMap,
        next_state: StateMap,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            action: action.into(),
            reward,
            state,
            next_state,
            timestamp: Utc::now(),
        }
    }
}
