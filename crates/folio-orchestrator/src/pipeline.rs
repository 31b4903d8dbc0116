use crate::monitor::AgentMonitor;
use folio_agent::{AgentConfig, SpinAgent, SpinContext};
use folio_core::{AgentRole, Chapter, FolioError, FolioResult, HumanFeedback, Interrupt};
use folio_learning::RewardEngine;
use tracing::{info, warn};

/// Borrowed collaborators for one pipeline pass.
pub struct PassContext<'a> {
    pub engine: &'a RewardEngine,
    pub interrupt: &'a Interrupt,
    pub monitor: &'a AgentMonitor,
    /// When off, rewards are still computed but never fed to the engine.
    pub learning_enabled: bool,
}

/// The fixed writer → reviewer → editor chain.
pub struct AgentPipeline {
    agents: Vec<SpinAgent>,
}

impl AgentPipeline {
    /// Order `agents` along the chain. Each role must appear exactly once.
    pub fn new(agents: Vec<SpinAgent>) -> FolioResult<Self> {
        let mut slots: Vec<Option<SpinAgent>> = AgentRole::CHAIN.iter().map(|_| None).collect();
        for agent in agents {
            let idx = AgentRole::CHAIN
                .iter()
                .position(|r| *r == agent.role())
                .ok_or_else(|| FolioError::Config(format!("unknown agent role {}", agent.role())))?;
            if slots[idx].is_some() {
                return Err(FolioError::Config(format!(
                    "more than one {} agent configured",
                    agent.role()
                )));
            }
            slots[idx] = Some(agent);
        }

        let agents = slots
            .into_iter()
            .zip(AgentRole::CHAIN)
            .map(|(slot, role)| {
                slot.ok_or_else(|| FolioError::Config(format!("no {role} agent configured")))
            })
            .collect::<FolioResult<Vec<_>>>()?;
        Ok(Self { agents })
    }

    /// Build provider-backed agents from their configs.
    pub fn from_configs(configs: Vec<AgentConfig>) -> FolioResult<Self> {
        let agents = configs
            .into_iter()
            .map(SpinAgent::new)
            .collect::<FolioResult<Vec<_>>>()?;
        Self::new(agents)
    }

    pub fn agents(&self) -> &[SpinAgent] {
        &self.agents
    }

    pub fn agent(&self, role: AgentRole) -> Option<&SpinAgent> {
        self.agents.iter().find(|a| a.role() == role)
    }

    /// Run one full pass over `chapter`.
    ///
    /// The writer's and editor's outputs replace the working text; the
    /// reviewer's is recorded only. Only a pass where all three calls succeed
    /// is committed (new content, three spin records, version + 1) and only
    /// then are its observations fed to the engine. On error the chapter is
    /// left untouched.
    pub async fn transform(
        &self,
        chapter: &mut Chapter,
        feedback: &[HumanFeedback],
        ctx: &PassContext<'_>,
    ) -> FolioResult<()> {
        let spin_ctx = SpinContext {
            chapter_id: chapter.id,
            engine: ctx.engine,
            interrupt: ctx.interrupt,
        };

        let mut content = chapter.content.clone();
        let mut records = Vec::with_capacity(self.agents.len());
        let mut observations = Vec::with_capacity(self.agents.len());

        for agent in &self.agents {
            let role = agent.role();
            ctx.monitor.start_spin(role, chapter.id).await;
            let outcome = match agent.spin(&content, feedback, &spin_ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if e.is_interrupted() {
                        ctx.monitor.abandon_spin(role).await;
                    } else {
                        ctx.monitor.record_error(role).await;
                    }
                    return Err(e);
                }
            };
            ctx.monitor
                .finish_spin(role, outcome.record.metadata.processing_ms, outcome.record.reward)
                .await;

            if rewrites_content(role) {
                content = outcome.record.response.clone();
            }
            records.push(outcome.record);
            observations.push(outcome.observation);
        }

        chapter.commit_pass(content, records);
        if ctx.learning_enabled {
            for observation in observations {
                ctx.engine.record(observation);
            }
        }

        info!(
            chapter_id = %chapter.id,
            version = chapter.version,
            reward_score = chapter.reward_score,
            "Pipeline pass committed"
        );
        Ok(())
    }

    /// Raise the temperature of every agent whose mean reward is below
    /// `threshold`. Agents without observations are left alone. Returns the
    /// roles that changed with their new temperature.
    pub fn tune_temperatures(
        &self,
        engine: &RewardEngine,
        threshold: f64,
        step: f32,
        cap: f32,
    ) -> Vec<(AgentRole, f32)> {
        let mut changed = Vec::new();
        for agent in &self.agents {
            let stats = engine.action_stats(&agent.role().action_label());
            if stats.count == 0 || stats.mean_reward >= threshold {
                continue;
            }
            let before = agent.temperature();
            let after = agent.raise_temperature(step, cap);
            if after > before {
                warn!(
                    role = %agent.role(),
                    mean_reward = stats.mean_reward,
                    temperature = after,
                    "Raising agent temperature"
                );
                changed.push((agent.role(), after));
            }
        }
        changed
    }
}

fn rewrites_content(role: AgentRole) -> bool {
    role != AgentRole::Reviewer
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::profiles::default_agents;
    use async_trait::async_trait;
    use folio_agent::{GenerationBackend, GenerationRequest, LlmClient, LlmProvider, ModelConfig};
    use folio_core::ChapterStatus;
    use folio_learning::{LearningConfig, RewardObservation, StateMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Echoes a role tag so the test can tell which output landed where.
    struct TaggingBackend {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl GenerationBackend for TaggingBackend {
        fn model_id(&self) -> &str {
            "tagging"
        }

        async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(n) {
                return Err(FolioError::Generation("model unavailable".into()));
            }
            let tag = if request.system_prompt.contains("writer") {
                "written"
            } else if request.system_prompt.contains("reviewer") {
                "reviewed"
            } else {
                "edited"
            };
            Ok(format!("{tag} text number {n}"))
        }
    }

    fn pipeline(fail_on: Option<usize>) -> AgentPipeline {
        let backend: Arc<dyn GenerationBackend> = Arc::new(TaggingBackend {
            calls: AtomicUsize::new(0),
            fail_on,
        });
        let base = ModelConfig::new(LlmProvider::OpenAi, "stub");
        let agents = default_agents(&base)
            .into_iter()
            .map(|cfg| SpinAgent::with_client(cfg, LlmClient::from_backend(backend.clone())))
            .collect();
        AgentPipeline::new(agents).unwrap()
    }

    fn engine() -> RewardEngine {
        RewardEngine::with_seed(LearningConfig::default(), 1)
    }

    #[tokio::test]
    async fn test_pass_commits_writer_then_editor() {
        let pipeline = pipeline(None);
        let engine = engine();
        let monitor = AgentMonitor::new();
        let interrupt = Interrupt::never();
        let ctx = PassContext {
            engine: &engine,
            interrupt: &interrupt,
            monitor: &monitor,
            learning_enabled: true,
        };

        let mut chapter = Chapter::new("One", "original words here");
        pipeline.transform(&mut chapter, &[], &ctx).await.unwrap();

        assert_eq!(chapter.version, 2);
        assert_eq!(chapter.spin_history.len(), 3);
        assert_eq!(chapter.content, "edited text number 2");
        assert_eq!(chapter.original_content, "original words here");
        let roles: Vec<AgentRole> = chapter.spin_history.iter().map(|r| r.role).collect();
        assert_eq!(roles, AgentRole::CHAIN.to_vec());
        // The editor worked on the writer's text, not the reviewer's.
        assert!(chapter.spin_history[2].prompt.contains("written text number 0"));
        assert_eq!(engine.observation_count(), 3);
        assert_eq!(monitor.snapshot().await.aggregate.spins, 3);
    }

    #[tokio::test]
    async fn test_failed_pass_leaves_chapter_untouched() {
        let pipeline = pipeline(Some(1));
        let engine = engine();
        let monitor = AgentMonitor::new();
        let interrupt = Interrupt::never();
        let ctx = PassContext {
            engine: &engine,
            interrupt: &interrupt,
            monitor: &monitor,
            learning_enabled: true,
        };

        let mut chapter = Chapter::new("One", "original words here");
        let err = pipeline.transform(&mut chapter, &[], &ctx).await.unwrap_err();
        assert!(matches!(err, FolioError::Generation(_)));
        assert_eq!(chapter.version, 1);
        assert!(chapter.spin_history.is_empty());
        assert_eq!(chapter.content, "original words here");
        assert_eq!(chapter.status, ChapterStatus::Scraped);
        assert_eq!(engine.observation_count(), 0);
        assert_eq!(monitor.snapshot().await.aggregate.errors, 1);
    }

    #[tokio::test]
    async fn test_learning_disabled_skips_engine() {
        let pipeline = pipeline(None);
        let engine = engine();
        let monitor = AgentMonitor::new();
        let interrupt = Interrupt::never();
        let ctx = PassContext {
            engine: &engine,
            interrupt: &interrupt,
            monitor: &monitor,
            learning_enabled: false,
        };

        let mut chapter = Chapter::new("One", "original words here");
        pipeline.transform(&mut chapter, &[], &ctx).await.unwrap();
        assert_eq!(chapter.version, 2);
        assert!(chapter.spin_history.iter().all(|r| r.reward >= 0.0));
        assert_eq!(engine.observation_count(), 0);
    }

    #[test]
    fn test_chain_requires_every_role_once() {
        let backend: Arc<dyn GenerationBackend> = Arc::new(TaggingBackend {
            calls: AtomicUsize::new(0),
            fail_on: None,
        });
        let base = ModelConfig::new(LlmProvider::OpenAi, "stub");
        let make = |configs: Vec<AgentConfig>| {
            configs
                .into_iter()
                .map(|cfg| SpinAgent::with_client(cfg, LlmClient::from_backend(backend.clone())))
                .collect::<Vec<_>>()
        };

        let mut missing = default_agents(&base);
        missing.pop();
        assert!(matches!(AgentPipeline::new(make(missing)), Err(FolioError::Config(_))));

        let mut doubled = default_agents(&base);
        doubled.push(doubled[0].clone());
        assert!(matches!(AgentPipeline::new(make(doubled)), Err(FolioError::Config(_))));

        // Any input order is accepted.
        let mut reversed = default_agents(&base);
        reversed.reverse();
        let pipeline = AgentPipeline::new(make(reversed)).unwrap();
        assert_eq!(pipeline.agents()[0].role(), AgentRole::Writer);
    }

    #[test]
    fn test_low_reward_agents_heat_up() {
        let pipeline = pipeline(None);
        let engine = engine();
        for reward in [20.0, 30.0] {
            engine.record(RewardObservation::new(
                uuid::Uuid::new_v4(),
                AgentRole::Writer.action_label(),
                reward,
                StateMap::new(),
                StateMap::new(),
            ));
        }
        engine.record(RewardObservation::new(
            uuid::Uuid::new_v4(),
            AgentRole::Editor.action_label(),
            80.0,
            StateMap::new(),
            StateMap::new(),
        ));

        let changed = pipeline.tune_temperatures(&engine, 50.0, 0.1, 1.0);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, AgentRole::Writer);
        assert!((changed[0].1 - 0.9).abs() < 1e-6);

        // Capped: further rounds stop changing it.
        pipeline.tune_temperatures(&engine, 50.0, 0.1, 1.0);
        let last = pipeline.tune_temperatures(&engine, 50.0, 0.1, 1.0);
        assert!(last.is_empty());
        let writer = pipeline.agent(AgentRole::Writer).unwrap();
        assert!((writer.temperature() - 1.0).abs() < 1e-6);
    }
}
