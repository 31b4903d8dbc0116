use crate::embedding::{cosine_distance, EmbeddingProvider, LocalEmbedding};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::{Chapter, FolioError, FolioResult, SpinRecord, WorkUnit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Flat metadata attached to every stored document.
pub type Metadata = HashMap<String, Value>;

/// The three document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Books,
    Chapters,
    /// One document per spin record.
    Versions,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Books, Collection::Chapters, Collection::Versions];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Books => "books",
            Collection::Chapters => "chapters",
            Collection::Versions => "versions",
        }
    }
}

/// A document as held by a store, embedding included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub collection: Collection,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
    pub stored_at: DateTime<Utc>,
}

/// A stored document without its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// One similarity-search result. Lower distance is closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentStats {
    pub total_books: usize,
    pub total_chapters: usize,
    pub total_versions: usize,
    /// Mean `reward_score` over stored chapters, 0 when there are none.
    pub mean_reward: f64,
}

/// Trait for content persistence and similarity search.
///
/// Writes are upserts keyed by document id, so storing the same chapter twice
/// replaces the earlier copy.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store the book record only; chapters are stored individually.
    async fn store_book(&self, book: &WorkUnit) -> FolioResult<()>;

    /// Store a chapter and its spin records under `parent_id`.
    async fn store_chapter(&self, chapter: &Chapter, parent_id: Uuid) -> FolioResult<()>;

    /// Chapters closest to `text`, restricted to those whose metadata equals
    /// every entry of `filters`.
    async fn query(&self, text: &str, filters: &Metadata, limit: usize) -> FolioResult<Vec<SearchHit>>;

    async fn stats(&self) -> FolioResult<ContentStats>;

    /// Stored spin records of a chapter, oldest first.
    async fn chapter_versions(&self, chapter_id: Uuid) -> FolioResult<Vec<ContentRecord>>;

    /// Chapters closest to the given one, excluding itself. Empty if the
    /// chapter is not stored.
    async fn find_similar_chapters(&self, chapter_id: Uuid, limit: usize) -> FolioResult<Vec<SearchHit>>;
}

pub(crate) fn book_metadata(book: &WorkUnit) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("title".into(), Value::from(book.title.clone()));
    meta.insert("author".into(), Value::from(book.metadata.author.clone()));
    meta.insert("genre".into(), Value::from(book.metadata.genre.clone()));
    meta.insert("language".into(), Value::from(book.metadata.language.clone()));
    meta.insert("chapter_count".into(), Value::from(book.chapters.len()));
    meta.insert("source_url".into(), Value::from(book.metadata.source_url.clone()));
    meta.insert(
        "estimated_reading_time".into(),
        Value::from(book.metadata.estimated_reading_time),
    );
    meta.insert("created_at".into(), Value::from(book.created_at.to_rfc3339()));
    meta
}

pub(crate) fn chapter_metadata(chapter: &Chapter, parent_id: Uuid) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("title".into(), Value::from(chapter.title.clone()));
    meta.insert("book_id".into(), Value::from(parent_id.to_string()));
    meta.insert("version".into(), Value::from(chapter.version));
    meta.insert("status".into(), Value::from(chapter.status.to_string()));
    meta.insert("reward_score".into(), Value::from(chapter.reward_score));
    meta.insert("word_count".into(), Value::from(chapter.word_count()));
    meta.insert("created_at".into(), Value::from(chapter.created_at.to_rfc3339()));
    meta.insert("updated_at".into(), Value::from(chapter.updated_at.to_rfc3339()));
    meta
}

pub(crate) fn version_metadata(record: &SpinRecord, chapter_id: Uuid) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("chapter_id".into(), Value::from(chapter_id.to_string()));
    meta.insert("role".into(), Value::from(record.role.to_string()));
    meta.insert("model".into(), Value::from(record.model.clone()));
    meta.insert("reward".into(), Value::from(record.reward));
    meta.insert("timestamp".into(), Value::from(record.timestamp.to_rfc3339()));
    meta.insert("processing_ms".into(), Value::from(record.metadata.processing_ms));
    meta.insert("input_length".into(), Value::from(record.metadata.input_length));
    meta.insert("output_length".into(), Value::from(record.metadata.output_length));
    meta
}

fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

#[derive(Default)]
struct Collections {
    books: Vec<StoredDocument>,
    chapters: Vec<StoredDocument>,
    versions: Vec<StoredDocument>,
}

impl Collections {
    fn get(&self, collection: Collection) -> &Vec<StoredDocument> {
        match collection {
            Collection::Books => &self.books,
            Collection::Chapters => &self.chapters,
            Collection::Versions => &self.versions,
        }
    }

    fn get_mut(&mut self, collection: Collection) -> &mut Vec<StoredDocument> {
        match collection {
            Collection::Books => &mut self.books,
            Collection::Chapters => &mut self.chapters,
            Collection::Versions => &mut self.versions,
        }
    }
}

/// In-process content store using brute-force cosine distance.
/// Suitable for single runs and small libraries.
pub struct InMemoryContentStore {
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<Collections>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(LocalEmbedding::default()))
    }

    pub fn with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(Collections::default()),
        }
    }

    /// Embed `content` into a document. Blank content gets a zero vector,
    /// which sits at distance 1 from everything.
    pub(crate) async fn document(
        &self,
        collection: Collection,
        id: String,
        content: String,
        metadata: Metadata,
    ) -> FolioResult<StoredDocument> {
        let embedding = if content.trim().is_empty() {
            vec![0.0; self.embedder.dimension()]
        } else {
            self.embedder.embed(&content).await?
        };
        Ok(StoredDocument {
            id,
            collection,
            content,
            embedding,
            metadata,
            stored_at: Utc::now(),
        })
    }

    /// Insert or replace by id. Returns `true` when an existing document was replaced.
    pub(crate) async fn upsert(&self, doc: StoredDocument) -> bool {
        let mut collections = self.collections.write().await;
        let docs = collections.get_mut(doc.collection);
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => {
                *existing = doc;
                true
            }
            None => {
                docs.push(doc);
                false
            }
        }
    }

    pub(crate) async fn documents(&self, collection: Collection) -> Vec<StoredDocument> {
        self.collections.read().await.get(collection).clone()
    }

    /// Build the documents for a chapter and its spin records.
    pub(crate) async fn chapter_documents(
        &self,
        chapter: &Chapter,
        parent_id: Uuid,
    ) -> FolioResult<Vec<StoredDocument>> {
        let mut docs = vec![
            self.document(
                Collection::Chapters,
                chapter.id.to_string(),
                chapter.content.clone(),
                chapter_metadata(chapter, parent_id),
            )
            .await?,
        ];
        for record in &chapter.spin_history {
            docs.push(
                self.document(
                    Collection::Versions,
                    record.id.to_string(),
                    record.response.clone(),
                    version_metadata(record, chapter.id),
                )
                .await?,
            );
        }
        Ok(docs)
    }

    pub(crate) async fn book_document(&self, book: &WorkUnit) -> FolioResult<StoredDocument> {
        let text = format!(
            "{} {} {}",
            book.title, book.metadata.description, book.metadata.genre
        );
        self.document(Collection::Books, book.id.to_string(), text, book_metadata(book))
            .await
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        filters: &Metadata,
        exclude: Option<&str>,
        limit: usize,
    ) -> Vec<SearchHit> {
        let collections = self.collections.read().await;
        let mut hits: Vec<SearchHit> = collections
            .chapters
            .iter()
            .filter(|d| exclude != Some(d.id.as_str()))
            .filter(|d| matches_filters(&d.metadata, filters))
            .map(|d| SearchHit {
                id: d.id.clone(),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                distance: cosine_distance(embedding, &d.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn store_book(&self, book: &WorkUnit) -> FolioResult<()> {
        let doc = self.book_document(book).await?;
        self.upsert(doc).await;
        Ok(())
    }

    async fn store_chapter(&self, chapter: &Chapter, parent_id: Uuid) -> FolioResult<()> {
        for doc in self.chapter_documents(chapter, parent_id).await? {
            self.upsert(doc).await;
        }
        Ok(())
    }

    async fn query(&self, text: &str, filters: &Metadata, limit: usize) -> FolioResult<Vec<SearchHit>> {
        if text.trim().is_empty() {
            return Err(FolioError::Validation("search query is empty".into()));
        }
        let embedding = self.embedder.embed(text).await?;
        Ok(self.nearest(&embedding, filters, None, limit).await)
    }

    async fn stats(&self) -> FolioResult<ContentStats> {
        let collections = self.collections.read().await;
        let rewards: Vec<f64> = collections
            .chapters
            .iter()
            .map(|d| d.metadata.get("reward_score").and_then(Value::as_f64).unwrap_or(0.0))
            .collect();
        let mean_reward = if rewards.is_empty() {
            0.0
        } else {
            rewards.iter().sum::<f64>() / rewards.len() as f64
        };
        Ok(ContentStats {
            total_books: collections.books.len(),
            total_chapters: collections.chapters.len(),
            total_versions: collections.versions.len(),
            mean_reward,
        })
    }

    async fn chapter_versions(&self, chapter_id: Uuid) -> FolioResult<Vec<ContentRecord>> {
        let key = Value::from(chapter_id.to_string());
        let collections = self.collections.read().await;
        Ok(collections
            .versions
            .iter()
            .filter(|d| d.metadata.get("chapter_id") == Some(&key))
            .map(|d| ContentRecord {
                id: d.id.clone(),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
            })
            .collect())
    }

    async fn find_similar_chapters(&self, chapter_id: Uuid, limit: usize) -> FolioResult<Vec<SearchHit>> {
        let id = chapter_id.to_string();
        let target = {
            let collections = self.collections.read().await;
            collections
                .chapters
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.embedding.clone())
        };
        match target {
            Some(embedding) => Ok(self.nearest(&embedding, &Metadata::new(), Some(&id), limit).await),
            None => Ok(Vec::new()),
        }
    }
}
