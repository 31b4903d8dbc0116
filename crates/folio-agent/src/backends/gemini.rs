use super::{GenerationBackend, GenerationRequest};
use crate::config::ModelConfig;
use async_trait::async_trait;
use folio_core::{FolioError, FolioResult};

/// Google Gemini `generateContent` backend.
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
        self.config.ensure_callable()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model_id
        );

        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user_prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
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
                "Gemini API error {status}: {resp_body}"
            )));
        }

        parse_gemini_response(&resp_body)
    }
}

pub fn parse_gemini_response(body: &serde_json::Value) -> FolioResult<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| FolioError::Generation("Missing candidates in Gemini response".into()))?;
    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}
