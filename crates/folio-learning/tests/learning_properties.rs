#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Behavioral properties of the reward engine under repeated updates.

use folio_learning::{LearningConfig, RewardEngine, RewardObservation, StateMap};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn state(label: &str) -> StateMap {
    let mut s = StateMap::new();
    s.insert("label".into(), json!(label));
    s
}

fn config_with_epsilon(epsilon: f64) -> LearningConfig {
    LearningConfig {
        epsilon,
        ..LearningConfig::default()
    }
}

#[test]
fn test_self_loop_converges_to_discounted_fixed_point() {
    // Fixed point of Q = r + γQ with r = 1, γ = 0.95.
    let target = 1.0 / (1.0 - 0.95);
    let engine = RewardEngine::new(LearningConfig::default());
    let subject = Uuid::new_v4();

    let mut previous = 0.0;
    for _ in 0..2_000 {
        let value = engine.record(RewardObservation::new(
            subject,
            "loop",
            1.0,
            state("s"),
            state("s"),
        ));
        assert!(value > previous, "value must increase monotonically");
        assert!(value < target, "value must stay below the fixed point");
        previous = value;
    }
    assert!((target - previous) / target < 0.01, "got {previous}");
}

#[test]
fn test_zero_epsilon_always_exploits() {
    let engine = RewardEngine::with_seed(config_with_epsilon(0.0), 7);
    let subject = Uuid::new_v4();
    engine.record(RewardObservation::new(subject, "b", 90.0, state("s"), state("t")));
    engine.record(RewardObservation::new(subject, "a", 10.0, state("s"), state("t")));

    for _ in 0..500 {
        let picked = engine.select_action(&state("s"), &["a", "b", "c"]).unwrap();
        assert_eq!(picked, "b");
    }
}

#[test]
fn test_full_epsilon_picks_uniformly() {
    let engine = RewardEngine::with_seed(config_with_epsilon(1.0), 42);
    let subject = Uuid::new_v4();
    engine.record(RewardObservation::new(subject, "a", 100.0, state("s"), state("t")));

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..3_000 {
        let picked = engine.select_action(&state("s"), &["a", "b", "c"]).unwrap();
        *counts.entry(picked).or_default() += 1;
    }
    for action in ["a", "b", "c"] {
        let count = counts.get(action).copied().unwrap_or(0);
        assert!((800..=1_200).contains(&count), "{action}: {count}");
    }
}

#[test]
fn test_tuning_responds_to_performance_bands() {
    let engine = RewardEngine::new(LearningConfig::default());

    let low = engine.optimize_parameters(0.1);
    assert!((low.epsilon - 0.15).abs() < 1e-9);
    assert!((low.learning_rate - 0.11).abs() < 1e-9);

    let unchanged = engine.optimize_parameters(0.5);
    assert_eq!(unchanged, low);

    let high = engine.optimize_parameters(0.9);
    assert!((high.epsilon - 0.13).abs() < 1e-9);
    assert!((high.learning_rate - 0.105).abs() < 1e-9);
    assert_eq!(high.discount_factor, 0.95);
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    let engine = std::sync::Arc::new(RewardEngine::new(LearningConfig::default()));
    let subject = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    engine.record(RewardObservation::new(
                        subject,
                        "shared",
                        10.0,
                        state("s"),
                        state("t"),
                    ));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.observation_count(), 400);
    let entry = engine
        .export_table()
        .into_iter()
        .find(|e| e.action == "shared")
        .unwrap();
    assert_eq!(entry.visits, 400);
}
