use crate::embedding::EmbeddingProvider;
use crate::store::{
    Collection, ContentRecord, ContentStats, ContentStore, InMemoryContentStore, Metadata,
    SearchHit, StoredDocument,
};
use async_trait::async_trait;
use folio_core::{Chapter, FolioError, FolioResult, WorkUnit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// File-backed content store: one JSONL file per collection under a directory.
///
/// Loads everything into memory on open. New documents are appended; a
/// replaced document rewrites its collection file.
pub struct FileContentStore {
    dir: PathBuf,
    inner: InMemoryContentStore,
}

impl FileContentStore {
    pub async fn open(dir: impl Into<PathBuf>) -> FolioResult<Self> {
        Self::open_with(dir, InMemoryContentStore::new()).await
    }

    pub async fn with_embedder(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> FolioResult<Self> {
        Self::open_with(dir, InMemoryContentStore::with_embedder(embedder)).await
    }

    async fn open_with(dir: impl Into<PathBuf>, inner: InMemoryContentStore) -> FolioResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| FolioError::Persistence(format!("Failed to create store dir: {e}")))?;

        let store = Self { dir, inner };
        let mut loaded = 0usize;
        for collection in Collection::ALL {
            let path = store.path_for(collection);
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                FolioError::Persistence(format!("Failed to read {}: {e}", path.display()))
            })?;
            for line in data.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let doc: StoredDocument = serde_json::from_str(line).map_err(|e| {
                    FolioError::Persistence(format!("Invalid JSONL entry in {}: {e}", path.display()))
                })?;
                store.inner.upsert(doc).await;
                loaded += 1;
            }
        }
        info!(dir = %store.dir.display(), documents = loaded, "Content store opened");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection.name()))
    }

    async fn append(&self, doc: &StoredDocument) -> FolioResult<()> {
        let path = self.path_for(doc.collection);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FolioError::Persistence(format!("Failed to open {}: {e}", path.display())))?;
        let mut line = serde_json::to_string(doc)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FolioError::Persistence(format!("Failed to write entry: {e}")))?;
        Ok(())
    }

    async fn rewrite(&self, collection: Collection) -> FolioResult<()> {
        let mut data = String::new();
        for doc in self.inner.documents(collection).await {
            data.push_str(&serde_json::to_string(&doc)?);
            data.push('\n');
        }
        let path = self.path_for(collection);
        tokio::fs::write(&path, data.as_bytes())
            .await
            .map_err(|e| FolioError::Persistence(format!("Failed to write {}: {e}", path.display())))?;
        debug!(collection = collection.name(), "Collection file rewritten");
        Ok(())
    }

    async fn persist(&self, doc: StoredDocument) -> FolioResult<()> {
        let collection = doc.collection;
        if self.inner.upsert(doc.clone()).await {
            self.rewrite(collection).await
        } else {
            self.append(&doc).await
        }
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn store_book(&self, book: &WorkUnit) -> FolioResult<()> {
        let doc = self.inner.book_document(book).await?;
        self.persist(doc).await
    }

    async fn store_chapter(&self, chapter: &Chapter, parent_id: Uuid) -> FolioResult<()> {
        for doc in self.inner.chapter_documents(chapter, parent_id).await? {
            self.persist(doc).await?;
        }
        Ok(())
    }

    async fn query(&self, text: &str, filters: &Metadata, limit: usize) -> FolioResult<Vec<SearchHit>> {
        self.inner.query(text, filters, limit).await
    }

    async fn stats(&self) -> FolioResult<ContentStats> {
        self.inner.stats().await
    }

    async fn chapter_versions(&self, chapter_id: Uuid) -> FolioResult<Vec<ContentRecord>> {
        self.inner.chapter_versions(chapter_id).await
    }

    async fn find_similar_chapters(&self, chapter_id: Uuid, limit: usize) -> FolioResult<Vec<SearchHit>> {
        self.inner.find_similar_chapters(chapter_id, limit).await
    }
}
