use super::{GenerationBackend, GenerationRequest};
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use folio_core::{FolioError, FolioResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Folio")
        } else {
            request
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
        self.config.ensure_callable()?;
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
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
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

pub fn parse_openai_response(body: &serde_json::Value) -> FolioResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FolioError::Generation("Missing message content in OpenAI response".into()))
}
