use crate::config::LearningConfig;
use crate::reward::{RewardObservation, RewardSignals, RewardWeights};
use crate::table::{state_key, StateMap, ValueTable, ValueTableEntry};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// The live, tunable learning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningParameters {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
}

/// Aggregate statistics over the whole reward history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardStats {
    pub total_observations: usize,
    pub mean_reward: f64,
    pub max_reward: f64,
    pub min_reward: f64,
    /// Percent change of the last window's mean over the window before it;
    /// 0 until two full windows exist.
    pub recent_trend: f64,
}

/// Reward statistics for a single action label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStats {
    pub count: usize,
    pub mean_reward: f64,
}

/// Best known action for a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPrediction {
    pub action: String,
    /// Visits of the chosen action over all visits recorded for the state.
    pub confidence: f64,
    pub expected_reward: f64,
}

/// Running reward aggregates plus the last two trend windows of rewards.
#[derive(Debug, Default)]
struct RewardHistory {
    count: usize,
    sum: f64,
    max: f64,
    min: f64,
    /// Most recent rewards, oldest first, at most `capacity` long.
    recent: VecDeque<f64>,
    capacity: usize,
    /// Per action label: (count, sum).
    per_action: HashMap<String, (usize, f64)>,
}

impl RewardHistory {
    fn new(trend_window: usize) -> Self {
        let capacity = trend_window.max(1) * 2;
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            ..Self::default()
        }
    }

    fn push(&mut self, action: &str, reward: f64) {
        if self.count == 0 {
            self.max = reward;
            self.min = reward;
        } else {
            self.max = self.max.max(reward);
            self.min = self.min.min(reward);
        }
        self.count += 1;
        self.sum += reward;

        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(reward);

        let slot = self.per_action.entry(action.to_string()).or_default();
        slot.0 += 1;
        slot.1 += reward;
    }

    /// Mean of the newest `n` rewards, or of all retained ones if fewer.
    fn tail_mean(&self, n: usize) -> Option<f64> {
        let take = n.min(self.recent.len());
        if take == 0 {
            return None;
        }
        Some(self.recent.iter().rev().take(take).sum::<f64>() / take as f64)
    }
}

/// Tabular Q-learner shared by every agent in the pipeline.
///
/// All table updates go through one write lock, so concurrent observations
/// for the same `(state, action)` pair never lose an update.
pub struct RewardEngine {
    config: LearningConfig,
    params: RwLock<LearningParameters>,
    table: RwLock<ValueTable>,
    history: RwLock<RewardHistory>,
    rng: Mutex<StdRng>,
}

impl RewardEngine {
    pub fn new(config: LearningConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic exploration, for tests and reproducible runs.
    pub fn with_seed(config: LearningConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: LearningConfig, rng: StdRng) -> Self {
        let params = LearningParameters {
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon: config.epsilon,
        };
        let history = RewardHistory::new(config.trend_window);
        Self {
            config,
            params: RwLock::new(params),
            table: RwLock::new(ValueTable::new()),
            history: RwLock::new(history),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.config.weights
    }

    pub fn parameters(&self) -> LearningParameters {
        *self.params.read()
    }

    /// Combined reward for one agent call using the configured weights.
    pub fn calculate_reward(&self, signals: &RewardSignals) -> f64 {
        self.config.weights.combine(signals)
    }

    /// Fold an observation into the reward statistics and apply the Q-update:
    /// `Q(s,a) ← Q(s,a) + α·[r + γ·max_a' Q(s',a') − Q(s,a)]`.
    ///
    /// Returns the updated value.
    pub fn record(&self, observation: RewardObservation) -> f64 {
        let params = self.parameters();
        let state = state_key(&observation.state);
        let next_state = state_key(&observation.next_state);

        let updated = {
            let mut table = self.table.write();
            let best_next = table.max_value(&next_state);
            let entry = table.entry_mut(&state, &observation.action);
            entry.value += params.learning_rate
                * (observation.reward + params.discount_factor * best_next - entry.value);
            entry.visits += 1;
            entry.value
        };

        debug!(
            action = %observation.action,
            reward = observation.reward,
            value = updated,
            "Value table updated"
        );
        self.history
            .write()
            .push(&observation.action, observation.reward);
        updated
    }

    /// Current estimate for a pair, 0 if never observed.
    pub fn value(&self, state: &StateMap, action: &str) -> f64 {
        self.table.read().value(&state_key(state), action)
    }

    /// Epsilon-greedy choice among `candidates`.
    ///
    /// With probability ε a uniformly random candidate; otherwise the
    /// highest-valued one, ties going to the earlier candidate. `None` only
    /// for an empty candidate list.
    pub fn select_action<S: AsRef<str>>(&self, state: &StateMap, candidates: &[S]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let epsilon = self.params.read().epsilon;
        {
            let mut rng = self.rng.lock();
            if rng.gen::<f64>() < epsilon {
                let idx = rng.gen_range(0..candidates.len());
                return Some(candidates[idx].as_ref().to_string());
            }
        }

        let key = state_key(state);
        let table = self.table.read();
        let mut best = candidates[0].as_ref();
        let mut best_value = table.value(&key, best);
        for candidate in &candidates[1..] {
            let value = table.value(&key, candidate.as_ref());
            if value > best_value {
                best = candidate.as_ref();
                best_value = value;
            }
        }
        Some(best.to_string())
    }

    /// Adjust ε and α from a performance score in `[0, 1]`.
    ///
    /// Poor performance widens exploration, strong performance narrows it,
    /// anything in between leaves the parameters alone.
    pub fn optimize_parameters(&self, performance: f64) -> LearningParameters {
        let tuning = &self.config.tuning;
        let mut params = self.params.write();
        let before = *params;

        if performance < tuning.low_performance {
            params.epsilon = (params.epsilon + tuning.epsilon_step_up).min(tuning.epsilon_cap);
            params.learning_rate =
                (params.learning_rate + tuning.learning_rate_step_up).min(tuning.learning_rate_cap);
        } else if performance > tuning.high_performance {
            params.epsilon = (params.epsilon - tuning.epsilon_step_down).max(tuning.epsilon_floor);
            params.learning_rate = (params.learning_rate - tuning.learning_rate_step_down)
                .max(tuning.learning_rate_floor);
        }

        if *params != before {
            info!(
                performance,
                epsilon = params.epsilon,
                learning_rate = params.learning_rate,
                "Learning parameters tuned"
            );
        }
        *params
    }

    /// Mean of the most recent window of rewards scaled to `[0, 1]`, or
    /// `None` before the first observation.
    pub fn rolling_performance(&self) -> Option<f64> {
        let window = self.config.trend_window.max(1);
        let mean = self.history.read().tail_mean(window)?;
        Some((mean / 100.0).clamp(0.0, 1.0))
    }

    /// Re-tune from the rolling reward trend. No-op without history.
    pub fn optimize_from_history(&self) -> Option<LearningParameters> {
        self.rolling_performance()
            .map(|performance| self.optimize_parameters(performance))
    }

    pub fn reward_stats(&self) -> RewardStats {
        let history = self.history.read();
        if history.count == 0 {
            return RewardStats::default();
        }

        let window = self.config.trend_window.max(1);
        let mut recent_trend = 0.0;
        if history.recent.len() >= window * 2 {
            let newest: Vec<f64> = history.recent.iter().rev().take(window * 2).copied().collect();
            let recent = newest[..window].iter().sum::<f64>() / window as f64;
            let previous = newest[window..].iter().sum::<f64>() / window as f64;
            if previous != 0.0 {
                recent_trend = (recent - previous) / previous * 100.0;
            }
        }

        RewardStats {
            total_observations: history.count,
            mean_reward: history.sum / history.count as f64,
            max_reward: history.max,
            min_reward: history.min,
            recent_trend,
        }
    }

    pub fn action_stats(&self, action: &str) -> ActionStats {
        match self.history.read().per_action.get(action) {
            Some(&(count, sum)) if count > 0 => ActionStats {
                count,
                mean_reward: sum / count as f64,
            },
            _ => ActionStats::default(),
        }
    }

    /// Best-valued recorded action for a state, `None` if the state is unseen.
    pub fn predict_optimal_action(&self, state: &StateMap) -> Option<ActionPrediction> {
        let key = state_key(state);
        let table = self.table.read();
        let actions = table.actions(&key);
        let total_visits: u64 = actions.iter().map(|e| e.visits).sum();

        let mut best: Option<&ValueTableEntry> = None;
        for entry in actions {
            if best.map_or(true, |b| entry.value > b.value) {
                best = Some(entry);
            }
        }

        best.map(|entry| ActionPrediction {
            action: entry.action.clone(),
            confidence: entry.visits as f64 / total_visits.max(1) as f64,
            expected_reward: entry.value,
        })
    }

    pub fn observation_count(&self) -> usize {
        self.history.read().count
    }

    pub fn export_table(&self) -> Vec<ValueTableEntry> {
        self.table.read().export()
    }

    /// Replace the value table, e.g. with one saved by a previous run.
    pub fn import_table(&self, entries: Vec<ValueTableEntry>) {
        let count = entries.len();
        self.table.write().import(entries);
        info!(entries = count, "Value table imported");
    }
}
