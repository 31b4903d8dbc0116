use crate::backends::claude::ClaudeBackend;
use crate::backends::gemini::GeminiBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::{GenerationBackend, GenerationRequest};
use crate::config::{LlmProvider, ModelConfig};
use crate::failover::FailoverBackend;
use folio_core::FolioResult;
use std::sync::Arc;

fn backend_for(config: ModelConfig) -> Box<dyn GenerationBackend> {
    match config.provider {
        LlmProvider::Claude => Box::new(ClaudeBackend::new(config)),
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Box::new(OpenAiBackend::new(config))
        }
        LlmProvider::Gemini => Box::new(GeminiBackend::new(config)),
    }
}

/// Generation client that dispatches to the provider backend chosen by
/// configuration.
///
/// A config with `fallback_models` or a `retry_policy` is wrapped in a
/// [`FailoverBackend`] trying the primary model first.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn GenerationBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> FolioResult<Self> {
        if config.fallback_models.is_empty() && config.retry_policy.is_none() {
            return Ok(Self {
                backend: Arc::from(backend_for(config)),
            });
        }

        let policy = config.retry_policy.clone().unwrap_or_default();
        let mut primary = config;
        let fallbacks = std::mem::take(&mut primary.fallback_models);
        let mut backends = vec![backend_for(primary)];
        backends.extend(fallbacks.into_iter().map(backend_for));
        Ok(Self {
            backend: Arc::new(FailoverBackend::new(backends, policy)?),
        })
    }

    /// Create from a pre-built backend (stubs, custom providers).
    pub fn from_backend(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
        self.backend.generate(request).await
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("model", &self.backend.model_id())
            .finish()
    }
}
