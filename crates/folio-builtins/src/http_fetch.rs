use async_trait::async_trait;
use folio_core::{AcquiredDocument, AcquisitionService, FolioError, FolioResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

const UNTITLED: &str = "Untitled Chapter";

/// Settings for [`HttpAcquisition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("folio/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_response_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Plain HTTP acquisition: GET the page, take `<title>`, strip markup.
///
/// No rendering and no site-specific selectors.
pub struct HttpAcquisition {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpAcquisition {
    pub fn new(config: AcquisitionConfig) -> FolioResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| FolioError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

#[async_trait]
impl AcquisitionService for HttpAcquisition {
    async fn fetch(&self, source_ref: &str) -> FolioResult<AcquiredDocument> {
        let url = reqwest::Url::parse(source_ref)
            .map_err(|e| FolioError::Acquisition(format!("Invalid URL '{source_ref}': {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(FolioError::Acquisition(format!(
                    "Unsupported scheme '{scheme}'. Only http/https allowed."
                )))
            }
        }

        info!(url = %url, "HTTP fetch");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FolioError::Acquisition(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FolioError::Acquisition(format!(
                "{source_ref} returned {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FolioError::Acquisition(format!("Failed to read response body: {e}")))?;
        if body.len() > self.max_response_bytes {
            return Err(FolioError::Acquisition(format!(
                "Response too large: {} bytes (max: {} bytes)",
                body.len(),
                self.max_response_bytes
            )));
        }

        let html = String::from_utf8_lossy(&body);
        let title = extract_title(&html).unwrap_or_else(|| UNTITLED.to_string());
        let content = html_to_text(&html);
        if content.is_empty() {
            return Err(FolioError::Acquisition(format!("{source_ref} has no text content")));
        }

        let mut doc = AcquiredDocument::new(source_ref, title, content);
        doc.metadata
            .insert("status".into(), serde_json::json!(status.as_u16()));
        Ok(doc)
    }
}

#[allow(clippy::expect_used)]
fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

/// Text of the first `<title>` element, if non-empty.
pub fn extract_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&TITLE, r"(?is)<title[^>]*>(.*?)</title>");
    re.captures(html)
        .map(|c| collapse_spaces(&decode_entities(&c[1])))
        .filter(|t| !t.is_empty())
}

/// Visible text of an HTML page with block elements as paragraph breaks.
pub fn html_to_text(html: &str) -> String {
    static HIDDEN: OnceLock<Regex> = OnceLock::new();
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let without_hidden = regex(
        &HIDDEN,
        r"(?is)<(script|style|head|noscript)[^>]*>.*?</(script|style|head|noscript)>|<!--.*?-->",
    )
    .replace_all(html, " ");
    let with_breaks = regex(
        &BLOCK,
        r"(?i)<br\s*/?>|</?(p|div|h[1-6]|li|section|article|blockquote|tr)[^>]*>",
    )
    .replace_all(&without_hidden, "\n");
    let stripped = regex(&TAG, r"(?s)<[^>]+>").replace_all(&with_breaks, " ");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(collapse_spaces)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
