#![allow(clippy::unwrap_used, clippy::expect_used)]

//! HTTP acquisition against a mock server.

use folio_builtins::{AcquisitionConfig, HttpAcquisition};
use folio_core::{AcquisitionService, FolioError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<!doctype html>
<html><head><title>Chapter 1 - The Gates of Morning</title></head>
<body><article>
<p>The lighthouse keeper watched the storm roll in over the harbor.</p>
<p>By midnight the boats had all come home.</p>
</article></body></html>"#;

fn acquisition() -> HttpAcquisition {
    HttpAcquisition::new(AcquisitionConfig::default()).unwrap()
}

#[tokio::test]
async fn test_fetches_title_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book/Chapter_1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .mount(&server)
        .await;

    let url = format!("{}/book/Chapter_1", server.uri());
    let doc = acquisition().fetch(&url).await.unwrap();
    assert_eq!(doc.title, "Chapter 1 - The Gates of Morning");
    assert_eq!(
        doc.content,
        "The lighthouse keeper watched the storm roll in over the harbor.\n\n\
         By midnight the boats had all come home."
    );
    assert_eq!(doc.source_ref, url);
    assert_eq!(doc.metadata["word_count"], serde_json::json!(19));
}

#[tokio::test]
async fn test_missing_title_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Just text.</p>", "text/html"))
        .mount(&server)
        .await;

    let doc = acquisition().fetch(&server.uri()).await.unwrap();
    assert_eq!(doc.title, "Untitled Chapter");
    assert_eq!(doc.content, "Just text.");
}

#[tokio::test]
async fn test_error_status_is_acquisition_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = acquisition().fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(err, FolioError::Acquisition(ref m) if m.contains("404")));
}

#[tokio::test]
async fn test_empty_page_is_acquisition_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html><body> </body></html>", "text/html"))
        .mount(&server)
        .await;

    assert!(matches!(
        acquisition().fetch(&server.uri()).await,
        Err(FolioError::Acquisition(_))
    ));
}

#[tokio::test]
async fn test_oversized_response_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(64), "text/plain"))
        .mount(&server)
        .await;

    let acq = HttpAcquisition::new(AcquisitionConfig {
        max_response_bytes: 16,
        ..AcquisitionConfig::default()
    })
    .unwrap();
    let err = acq.fetch(&server.uri()).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}
