//! Acquisition service types.
//!
//! The acquisition side (page rendering, selector heuristics) lives outside
//! the orchestrator; it only needs something that turns a source reference
//! into a title and plain text.

use crate::FolioResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw text fetched for one chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredDocument {
    pub source_ref: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub fetched_at: DateTime<Utc>,
}

impl AcquiredDocument {
    pub fn new(
        source_ref: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let mut metadata = HashMap::new();
        metadata.insert(
            "word_count".to_string(),
            serde_json::json!(content.split_whitespace().count()),
        );
        Self {
            source_ref: source_ref.into(),
            title: title.into(),
            content,
            metadata,
            fetched_at: Utc::now(),
        }
    }
}

/// Fetches raw chapter text from a remote source.
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    /// Fetch one document. Fails with [`crate::FolioError::Acquisition`] when
    /// the source is unreachable or yields no text.
    async fn fetch(&self, source_ref: &str) -> FolioResult<AcquiredDocument>;
}
