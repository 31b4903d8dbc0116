//! Content persistence and similarity search.
//!
//! Books, chapters, and per-spin versions are kept in three collections and
//! embedded locally so chapters can be searched by cosine distance.
//!
//! # Main types
//!
//! - [`ContentStore`]: Trait consumed by the workflow orchestrator.
//! - [`InMemoryContentStore`]: Process-local store.
//! - [`FileContentStore`]: JSONL-backed store that survives restarts.
//! - [`LocalEmbedding`]: Hashed bag-of-words embedding.

/// Embedding provider trait and local implementation.
pub mod embedding;
/// JSONL file-backed store.
pub mod file;
/// Content store trait and in-memory implementation.
pub mod store;

pub use embedding::{cosine_distance, cosine_similarity, EmbeddingProvider, LocalEmbedding};
pub use file::FileContentStore;
pub use store::{
    Collection, ContentRecord, ContentStats, ContentStore, InMemoryContentStore, Metadata,
    SearchHit, StoredDocument,
};
