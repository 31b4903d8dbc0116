use crate::reward::RewardWeights;
use serde::{Deserialize, Serialize};

/// Initial learning parameters plus the rules for tuning them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Step size α of the Q-update.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Discount factor γ applied to the best next-state value.
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,
    /// Exploration probability ε for action selection.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Observations per window when computing trend and rolling performance.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    #[serde(default)]
    pub weights: RewardWeights,
    #[serde(default)]
    pub tuning: TuningConfig,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_discount_factor() -> f64 {
    0.95
}

fn default_epsilon() -> f64 {
    0.1
}

fn default_trend_window() -> usize {
    10
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            discount_factor: default_discount_factor(),
            epsilon: default_epsilon(),
            trend_window: default_trend_window(),
            weights: RewardWeights::default(),
            tuning: TuningConfig::default(),
        }
    }
}

/// Thresholds and step sizes for `optimize_parameters`.
///
/// Below `low_performance` the engine widens exploration; above
/// `high_performance` it narrows toward exploitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_low_performance")]
    pub low_performance: f64,
    #[serde(default = "default_high_performance")]
    pub high_performance: f64,
    #[serde(default = "default_epsilon_step_up")]
    pub epsilon_step_up: f64,
    #[serde(default = "default_epsilon_cap")]
    pub epsilon_cap: f64,
    #[serde(default = "default_learning_rate_step_up")]
    pub learning_rate_step_up: f64,
    #[serde(default = "default_learning_rate_cap")]
    pub learning_rate_cap: f64,
    #[serde(default = "default_epsilon_step_down")]
    pub epsilon_step_down: f64,
    #[serde(default = "default_epsilon_floor")]
    pub epsilon_floor: f64,
    #[serde(default = "default_learning_rate_step_down")]
    pub learning_rate_step_down: f64,
    #[serde(default = "default_learning_rate_floor")]
    pub learning_rate_floor: f64,
}

fn default_low_performance() -> f64 {
    0.3
}
fn default_high_performance() -> f64 {
    0.8
}
fn default_epsilon_step_up() -> f64 {
    0.05
}
fn default_epsilon_cap() -> f64 {
    0.5
}
fn default_learning_rate_step_up() -> f64 {
    0.01
}
fn default_learning_rate_cap() -> f64 {
    0.3
}
fn default_epsilon_step_down() -> f64 {
    0.02
}
fn default_epsilon_floor() -> f64 {
    0.01
}
fn default_learning_rate_step_down() -> f64 {
    0.005
}
fn default_learning_rate_floor() -> f64 {
    0.05
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            low_performance: default_low_performance(),
            high_performance: default_high_performance(),
            epsilon_step_up: default_epsilon_step_up(),
            epsilon_cap: default_epsilon_cap(),
            learning_rate_step_up: default_learning_rate_step_up(),
            learning_rate_cap: default_learning_rate_cap(),
            epsilon_step_down: default_epsilon_step_down(),
            epsilon_floor: default_epsilon_floor(),
            learning_rate_step_down: default_learning_rate_step_down(),
            learning_rate_floor: default_learning_rate_floor(),
        }
    }
}
