use super::{GenerationBackend, GenerationRequest};
use crate::config::ModelConfig;
use async_trait::async_trait;
use folio_core::{FolioError, FolioResult};

/// Claude (Anthropic) API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationBackend for ClaudeBackend {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
        self.config.ensure_callable()?;
        let url = format!("{}/v1/messages", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system_prompt,
            "messages": [{ "role": "user", "content": request.user_prompt }],
        });

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FolioError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FolioError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(FolioError::Http(format!(
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

pub fn parse_claude_response(body: &serde_json::Value) -> FolioResult<String> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| FolioError::Generation("Missing content in Claude response".into()))?;

    let text_parts: Vec<&str> = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    Ok(text_parts.join("\n"))
}
