//! Reward computation and adaptive value learning.
//!
//! A tabular Q-learner over an open action space. Every agent call produces a
//! [`RewardObservation`]; the [`RewardEngine`] folds it into its value table,
//! keeps running reward statistics over a bounded recent window, and nudges its own exploration
//! and learning rates from rolling performance.
//!
//! # Main types
//!
//! - [`RewardEngine`]: Value table, epsilon-greedy selection, tuning, stats.
//! - [`RewardWeights`]: Weights of the combined reward formula.
//! - [`LearningConfig`]: Initial parameters, tuning thresholds, and weights.
//! - [`ValueTableEntry`]: One learned `(state, action)` estimate.

/// Learning parameters and tuning configuration.
pub mod config;
/// The reward engine.
pub mod engine;
/// Reward signals, weights, and observations.
pub mod reward;
/// State-key canonicalization and the value table.
pub mod table;

pub use config::{LearningConfig, TuningConfig};
pub use engine::{ActionPrediction, ActionStats, LearningParameters, RewardEngine, RewardStats};
pub use reward::{RewardObservation, RewardSignals, RewardWeights};
pub use table::{state_key, StateMap, ValueTable, ValueTableEntry};
