#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Store behaviour across the public API, both backends.

use folio_core::{Chapter, ChapterStatus, WorkUnit};
use folio_memory::{ContentStore, FileContentStore, InMemoryContentStore, Metadata};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

async fn populate(store: &dyn ContentStore) -> (WorkUnit, Vec<Chapter>) {
    let mut approved = Chapter::new("Storm", "The lighthouse keeper watched the storm roll in.");
    approved.advance(ChapterStatus::Approved).unwrap();
    let draft = Chapter::new("Market", "Vendors shouted prices across the crowded market square.");
    let book = WorkUnit::new(
        Uuid::new_v4(),
        "https://example.org/book/Chapter_1",
        vec![approved.clone(), draft.clone()],
    );
    for chapter in &book.chapters {
        store.store_chapter(chapter, book.id).await.unwrap();
    }
    store.store_book(&book).await.unwrap();
    (book, vec![approved, draft])
}

#[tokio::test]
async fn test_status_filter_narrows_search() {
    let store = InMemoryContentStore::new();
    let (_, chapters) = populate(&store).await;

    let mut filters = Metadata::new();
    filters.insert("status".into(), Value::from("approved"));
    let hits = store.query("market storm", &filters, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, chapters[0].id.to_string());
}

#[tokio::test]
async fn test_file_store_matches_memory_store() {
    let tmp = tempfile::tempdir().unwrap();
    let file_store = FileContentStore::open(tmp.path().join("content")).await.unwrap();
    let memory_store = InMemoryContentStore::new();

    populate(&file_store).await;
    populate(&memory_store).await;

    let a = file_store.stats().await.unwrap();
    let b = memory_store.stats().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.total_books, 1);
    assert_eq!(a.total_chapters, 2);
}

#[tokio::test]
async fn test_stores_are_usable_as_trait_objects() {
    let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let (book, _) = populate(store.as_ref()).await;
    let hits = store.query("lighthouse", &Metadata::new(), 5).await.unwrap();
    assert_eq!(hits[0].metadata["book_id"], Value::from(book.id.to_string()));
}
