use crate::failover::RetryPolicy;
use folio_core::{FolioError, FolioResult};
use serde::{Deserialize, Serialize};

/// Generation API a model is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Claude,
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter, OpenAI-compatible API.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
    /// Google Gemini `generateContent` API.
    Gemini,
}

impl LlmProvider {
    /// Environment variable conventionally holding this provider's key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::Gemini => "GOOGLE_API_KEY",
        }
    }
}

/// Model, credentials and sampling settings for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    /// Empty means "not configured"; calls then fail with a generation error.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    /// Tried in order when this model fails.
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Provider defaults: temperature 0.7, 4096 tokens, no key, no fallbacks.
    pub fn new(provider: LlmProvider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            fallback_models: Vec::new(),
            retry_policy: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Configured endpoint, or the provider's public one.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
            }
        }
    }

    /// Fill an empty key from the provider's environment variable.
    pub fn resolve_api_key_from_env(&mut self) {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var(self.provider.api_key_env()) {
                self.api_key = key;
            }
        }
        for fallback in &mut self.fallback_models {
            fallback.resolve_api_key_from_env();
        }
    }

    /// Checked by every backend right before issuing a request.
    pub fn ensure_callable(&self) -> FolioResult<()> {
        if self.model_id.trim().is_empty() {
            return Err(FolioError::Generation("model id is empty".into()));
        }
        if self.api_key.is_empty() {
            return Err(FolioError::Generation(format!(
                "no API key configured for {:?} model {} (set {})",
                self.provider,
                self.model_id,
                self.provider.api_key_env()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        assert_eq!(serde_json::to_string(&LlmProvider::Gemini).unwrap(), "\"gemini\"");
        let p: LlmProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(p, LlmProvider::OpenAi);
    }

    #[test]
    fn test_toml_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "openai"
            model_id = "gpt-4"
            "#,
        )
        .unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 4096);
        assert!(config.api_key.is_empty());
        assert!(config.fallback_models.is_empty());
        assert_eq!(config.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig::new(LlmProvider::Gemini, "gemini-pro").with_base_url("http://localhost:9");
        assert_eq!(config.base_url(), "http://localhost:9");
    }

    #[test]
    fn test_ensure_callable() {
        let missing_key = ModelConfig::new(LlmProvider::OpenAi, "gpt-4");
        assert!(matches!(
            missing_key.ensure_callable(),
            Err(FolioError::Generation(_))
        ));

        let empty_model = ModelConfig::new(LlmProvider::Claude, " ").with_api_key("k");
        assert!(empty_model.ensure_callable().is_err());

        let ok = ModelConfig::new(LlmProvider::Claude, "claude-sonnet").with_api_key("k");
        assert!(ok.ensure_callable().is_ok());
    }
}
