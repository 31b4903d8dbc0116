//! Content-quality heuristic for a generated rewrite.

use folio_core::HumanFeedback;
use std::collections::{HashMap, HashSet};

const BASE_SCORE: f64 = 50.0;

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Score `generated` against `original` on a `[0, 100]` scale.
///
/// Starts at 50 and adjusts for length ratio, vocabulary growth, sentence
/// length, and over-repeated tokens. Terms with an empty denominator are
/// skipped.
pub fn assess_content_quality(original: &str, generated: &str) -> f64 {
    let mut quality = BASE_SCORE;

    let original_words = original.split_whitespace().count();
    let generated_words = generated.split_whitespace().count();
    if original_words > 0 {
        let ratio = generated_words as f64 / original_words as f64;
        if (0.8..=1.5).contains(&ratio) {
            quality += 20.0;
        } else if !(0.5..=2.0).contains(&ratio) {
            quality -= 20.0;
        }
    }

    let original_vocab: HashSet<String> = tokens(original).into_iter().collect();
    let generated_tokens = tokens(generated);
    let generated_vocab: HashSet<&String> = generated_tokens.iter().collect();
    if !original_vocab.is_empty() {
        let growth = (generated_vocab.len() as f64 - original_vocab.len() as f64)
            / original_vocab.len() as f64;
        if growth > 0.1 {
            quality += 15.0;
        }
    }

    let sentence_lengths: Vec<usize> = generated
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.split_whitespace().count())
        .collect();
    if !sentence_lengths.is_empty() {
        let mean = sentence_lengths.iter().sum::<usize>() as f64 / sentence_lengths.len() as f64;
        if (10.0..=25.0).contains(&mean) {
            quality += 10.0;
        }
    }

    if !generated_tokens.is_empty() {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for token in &generated_tokens {
            *freq.entry(token.as_str()).or_default() += 1;
        }
        let limit = generated_tokens.len() as f64 * 0.05;
        let repetitive = freq.values().filter(|&&count| count as f64 > limit).count();
        quality -= repetitive as f64 * 5.0;
    }

    quality.clamp(0.0, 100.0)
}

/// Mean rating of the given feedback, neutral 5 when there is none.
pub fn feedback_score(feedback: &[HumanFeedback]) -> f64 {
    if feedback.is_empty() {
        return 5.0;
    }
    feedback.iter().map(|f| f.rating).sum::<f64>() / feedback.len() as f64
}
