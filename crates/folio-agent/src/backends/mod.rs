pub mod claude;
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use folio_core::FolioResult;

/// A single text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for generative-text provider backends.
///
/// Each provider (OpenAI-compatible, Claude, Gemini) implements this trait to
/// handle API communication. The concrete backend is picked from
/// `ModelConfig::provider` when the client is built.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Model identifier recorded on spin records.
    fn model_id(&self) -> &str;

    /// Run one completion and return the generated text.
    async fn generate(&self, request: &GenerationRequest) -> FolioResult<String>;
}
