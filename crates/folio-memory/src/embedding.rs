use async_trait::async_trait;
use folio_core::{FolioError, FolioResult};
use std::collections::HashMap;

/// Trait for computing text embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> FolioResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Local bag-of-words embedding; no external service needed.
///
/// Each word is hashed into three positions of a fixed-size vector weighted by
/// term frequency, then the vector is L2-normalized. Texts sharing vocabulary
/// land close together under cosine distance.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> FolioResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FolioError::Validation("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return Ok(vector);
        }

        for (word, count) in &freq {
            let tf = count / total;
            for (salt, weight) in PROBES {
                let slot = word_hash(word, salt) as usize % self.dimension;
                vector[slot] += tf * weight;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Salt and weight of each slot a word is spread over.
const PROBES: [(Option<u8>, f32); 3] = [(None, 1.0), (Some(1), 0.7), (Some(2), 0.5)];

/// FNV-1a over the word bytes, then the salt byte if any.
fn word_hash(word: &str, salt: Option<u8>) -> u32 {
    word.bytes()
        .chain(salt)
        .fold(0x811c_9dc5_u32, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        })
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / denom
}

/// Cosine distance `1 − similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dimension_and_normalization() {
        let emb = LocalEmbedding::new(128);
        let vec = emb.embed("the storm rolled over the harbor").await.unwrap();
        assert_eq!(vec.len(), 128);
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let emb = LocalEmbedding::default();
        let chapter = emb
            .embed("The lighthouse keeper watched the storm roll in over the harbor.")
            .await
            .unwrap();
        let related = emb.embed("lighthouse keeper watched the storm").await.unwrap();
        let unrelated = emb.embed("recipes for a quick dinner").await.unwrap();

        let near = cosine_distance(&chapter, &related);
        let far = cosine_distance(&chapter, &unrelated);
        assert!(near < far, "near={near} far={far}");
        assert!(near < 0.5);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let emb = LocalEmbedding::default();
        assert!(emb.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_deterministic() {
        let emb = LocalEmbedding::default();
        assert_eq!(
            emb.embed("same input").await.unwrap(),
            emb.embed("same input").await.unwrap()
        );
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
    }
}
