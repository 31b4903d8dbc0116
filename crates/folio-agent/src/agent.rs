use crate::backends::GenerationRequest;
use crate::config::ModelConfig;
use crate::llm::LlmClient;
use crate::quality::{assess_content_quality, feedback_score};
use chrono::Utc;
use folio_core::{AgentRole, FolioError, FolioResult, HumanFeedback, Interrupt, SpinMetadata, SpinRecord};
use folio_learning::{RewardEngine, RewardObservation, RewardSignals, StateMap};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Static description of one pipeline agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name, e.g. "Creative Writer".
    pub name: String,
    pub role: AgentRole,
    /// Provider, model, temperature and output cap.
    pub model: ModelConfig,
    pub system_prompt: String,
    /// Role instruction placed in front of the chapter content.
    pub instruction: String,
}

/// Borrowed context for a single spin.
pub struct SpinContext<'a> {
    /// Chapter being transformed; the subject of the reward observation.
    pub chapter_id: Uuid,
    pub engine: &'a RewardEngine,
    pub interrupt: &'a Interrupt,
}

/// Result of one agent call: the scored transcript and the learning event.
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    pub record: SpinRecord,
    pub observation: RewardObservation,
}

/// One generative agent in the writer → reviewer → editor chain.
///
/// Temperature is live state: the orchestrator raises it when the agent's
/// rewards lag.
pub struct SpinAgent {
    config: AgentConfig,
    client: LlmClient,
    temperature: RwLock<f32>,
}

impl SpinAgent {
    pub fn new(config: AgentConfig) -> FolioResult<Self> {
        let client = LlmClient::new(config.model.clone())?;
        Ok(Self::with_client(config, client))
    }

    /// Build with an explicit client, e.g. one wrapping a stub backend.
    pub fn with_client(config: AgentConfig, client: LlmClient) -> Self {
        let temperature = RwLock::new(config.model.temperature);
        Self {
            config,
            client,
            temperature,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn role(&self) -> AgentRole {
        self.config.role
    }

    pub fn model_id(&self) -> &str {
        &self.config.model.model_id
    }

    pub fn temperature(&self) -> f32 {
        *self.temperature.read()
    }

    /// Raise the temperature by `step`, never past `cap`. Returns the new value.
    pub fn raise_temperature(&self, step: f32, cap: f32) -> f32 {
        let mut temperature = self.temperature.write();
        *temperature = (*temperature + step).min(cap);
        *temperature
    }

    /// Role instruction, chapter content, and an optional feedback block.
    pub fn build_prompt(&self, content: &str, feedback: &[HumanFeedback]) -> String {
        let mut prompt = format!("{}\n\n{}", self.config.instruction, content);
        if !feedback.is_empty() {
            prompt.push_str("\n\nPrevious human feedback to consider:\n");
            for item in feedback {
                prompt.push_str(&format!("- {}\n", item.comment));
                if !item.suggestions.is_empty() {
                    prompt.push_str(&format!("  Suggestions: {}\n", item.suggestions.join(", ")));
                }
            }
        }
        prompt
    }

    /// Run one generation over `content` and score it.
    ///
    /// The call is raced against the run's interrupt; an interrupted call
    /// returns `FolioError::Interrupted` and yields nothing. Provider and
    /// transport failures surface as `FolioError::Generation`.
    pub async fn spin(
        &self,
        content: &str,
        feedback: &[HumanFeedback],
        ctx: &SpinContext<'_>,
    ) -> FolioResult<SpinOutcome> {
        let prompt = self.build_prompt(content, feedback);
        let temperature = self.temperature();
        let request = GenerationRequest {
            system_prompt: self.config.system_prompt.clone(),
            user_prompt: prompt.clone(),
            temperature,
            max_tokens: self.config.model.max_tokens,
        };

        let step = format!("{} generation", self.config.role);
        let started = Instant::now();
        let response = ctx
            .interrupt
            .guard(&step, self.client.generate(&request))
            .await
            .map_err(|e| match e {
                FolioError::Interrupted(_) | FolioError::Generation(_) => e,
                other => FolioError::Generation(format!("{} agent: {other}", self.config.role)),
            })
            .inspect_err(|e| {
                if !e.is_interrupted() {
                    warn!(role = %self.config.role, model = self.model_id(), error = %e, "Generation failed");
                }
            })?;
        let processing_ms = started.elapsed().as_millis() as u64;

        let quality = assess_content_quality(content, &response);
        let reward = ctx.engine.calculate_reward(&RewardSignals {
            quality,
            feedback_score: feedback_score(feedback),
            processing_ms,
            error_rate: 0.0,
        });

        debug!(
            role = %self.config.role,
            model = self.model_id(),
            processing_ms,
            quality,
            reward,
            "Spin completed"
        );

        let mut state = StateMap::new();
        state.insert("role".into(), serde_json::json!(self.config.role));
        state.insert("model".into(), serde_json::json!(self.model_id()));
        state.insert("input_length".into(), serde_json::json!(content.len()));
        let mut next_state = StateMap::new();
        next_state.insert("output_length".into(), serde_json::json!(response.len()));
        next_state.insert("quality".into(), serde_json::json!(quality));
        next_state.insert("completed".into(), serde_json::json!(true));

        let observation = RewardObservation::new(
            ctx.chapter_id,
            self.config.role.action_label(),
            reward,
            state,
            next_state,
        );

        let record = SpinRecord {
            id: Uuid::new_v4(),
            role: self.config.role,
            model: self.model_id().to_string(),
            prompt,
            metadata: SpinMetadata {
                processing_ms,
                input_length: content.len(),
                output_length: response.len(),
                temperature,
                quality,
            },
            response,
            reward,
            timestamp: Utc::now(),
        };

        Ok(SpinOutcome {
            record,
            observation,
        })
    }
}

impl std::fmt::Debug for SpinAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinAgent")
            .field("name", &self.config.name)
            .field("role", &self.config.role)
            .field("model", &self.config.model.model_id)
            .field("temperature", &self.temperature())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::GenerationBackend;
    use crate::config::LlmProvider;
    use async_trait::async_trait;
    use folio_core::RunControl;
    use folio_learning::LearningConfig;
    use std::sync::Arc;
    use std::time::Duration;

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        fn model_id(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
            Ok(format!("echo: {}", request.user_prompt.len()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl GenerationBackend for SlowBackend {
        fn model_id(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _request: &GenerationRequest) -> FolioResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into())
        }
    }

    fn config(role: AgentRole) -> AgentConfig {
        let mut model = ModelConfig::new(LlmProvider::OpenAi, "stub-model");
        model.temperature = 0.3;
        AgentConfig {
            name: "Test Agent".into(),
            role,
            model,
            system_prompt: "You are a test agent.".into(),
            instruction: "Rewrite:".into(),
        }
    }

    fn agent(role: AgentRole, backend: impl GenerationBackend + 'static) -> SpinAgent {
        SpinAgent::with_client(config(role), LlmClient::from_backend(Arc::new(backend)))
    }

    #[test]
    fn test_prompt_without_feedback() {
        let agent = agent(AgentRole::Writer, EchoBackend);
        assert_eq!(agent.build_prompt("Once upon a time.", &[]), "Rewrite:\n\nOnce upon a time.");
    }

    #[test]
    fn test_prompt_renders_feedback_verbatim() {
        let agent = agent(AgentRole::Editor, EchoBackend);
        let chapter = Uuid::new_v4();
        let feedback = vec![
            HumanFeedback::new(chapter, "ana", AgentRole::Editor, "Too flowery", 4.0)
                .with_suggestions(vec!["trim adjectives".into(), "shorter sentences".into()]),
            HumanFeedback::new(chapter, "ben", AgentRole::Editor, "Keep the ending", 6.0),
        ];
        let prompt = agent.build_prompt("Text.", &feedback);
        assert!(prompt.ends_with(
            "Previous human feedback to consider:\n\
             - Too flowery\n  Suggestions: trim adjectives, shorter sentences\n\
             - Keep the ending\n"
        ));
    }

    #[test]
    fn test_raise_temperature_caps() {
        let agent = agent(AgentRole::Writer, EchoBackend);
        assert!((agent.raise_temperature(0.1, 1.0) - 0.4).abs() < 1e-6);
        for _ in 0..10 {
            agent.raise_temperature(0.1, 1.0);
        }
        assert_eq!(agent.temperature(), 1.0);
    }

    #[tokio::test]
    async fn test_spin_produces_record_and_observation() {
        let engine = RewardEngine::new(LearningConfig::default());
        let agent = agent(AgentRole::Reviewer, EchoBackend);
        let chapter_id = Uuid::new_v4();
        let interrupt = Interrupt::never();
        let ctx = SpinContext {
            chapter_id,
            engine: &engine,
            interrupt: &interrupt,
        };

        let outcome = agent.spin("Some chapter text.", &[], &ctx).await.unwrap();
        assert_eq!(outcome.record.role, AgentRole::Reviewer);
        assert_eq!(outcome.record.model, "stub-model");
        assert!((0.0..=100.0).contains(&outcome.record.reward));
        assert_eq!(outcome.record.metadata.input_length, "Some chapter text.".len());
        assert_eq!(outcome.observation.action, "reviewer_spin");
        assert_eq!(outcome.observation.subject_id, chapter_id);
        assert_eq!(outcome.observation.reward, outcome.record.reward);
        assert_eq!(outcome.observation.state["role"], serde_json::json!("reviewer"));
        assert_eq!(outcome.observation.next_state["completed"], serde_json::json!(true));
        // Spinning does not feed the engine by itself.
        assert_eq!(engine.observation_count(), 0);
    }

    #[tokio::test]
    async fn test_spin_interrupted_by_pause() {
        let engine = RewardEngine::new(LearningConfig::default());
        let agent = agent(AgentRole::Writer, SlowBackend);
        let control = RunControl::new();
        let interrupt = control.interrupt();
        let ctx = SpinContext {
            chapter_id: Uuid::new_v4(),
            engine: &engine,
            interrupt: &interrupt,
        };

        let pause = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            control.pause();
        };
        let (result, _) = tokio::join!(agent.spin("text", &[], &ctx), pause);
        assert!(result.unwrap_err().is_interrupted());
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_generation_failure() {
        let engine = RewardEngine::new(LearningConfig::default());
        let agent = SpinAgent::new(config(AgentRole::Writer)).unwrap();
        let interrupt = Interrupt::never();
        let ctx = SpinContext {
            chapter_id: Uuid::new_v4(),
            engine: &engine,
            interrupt: &interrupt,
        };
        let err = agent.spin("text", &[], &ctx).await.unwrap_err();
        assert!(matches!(err, FolioError::Generation(_)));
    }
}
