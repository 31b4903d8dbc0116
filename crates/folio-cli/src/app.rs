use crate::config::FolioConfig;
use folio_builtins::HttpAcquisition;
use folio_learning::{RewardEngine, ValueTableEntry};
use folio_memory::FileContentStore;
use folio_orchestrator::{apply_overrides, default_agents, AgentPipeline, WorkflowOrchestrator};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a command needs, wired from `folio.toml`.
pub struct App {
    pub config: FolioConfig,
    pub orchestrator: WorkflowOrchestrator,
}

impl App {
    pub async fn build(config: FolioConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to create data dir '{}': {}",
                config.data_dir.display(),
                e
            )
        })?;

        // Overrides may switch provider, so keys are resolved afterwards.
        let mut agents = default_agents(&config.model);
        apply_overrides(&mut agents, &config.agents);
        for agent in &mut agents {
            agent.model.resolve_api_key_from_env();
            info!(
                role = %agent.role,
                provider = ?agent.model.provider,
                model = %agent.model.model_id,
                "Agent configured"
            );
        }
        let pipeline = AgentPipeline::from_configs(agents)?;

        let engine = Arc::new(RewardEngine::new(config.learning.clone()));
        let restored = load_value_table(&engine, &config.value_table_path()).await?;
        if restored > 0 {
            info!(entries = restored, "Value table restored");
        }

        let acquisition = Arc::new(HttpAcquisition::new(config.acquisition.clone())?);
        let store = Arc::new(FileContentStore::open(config.content_dir()).await?);

        let orchestrator = WorkflowOrchestrator::new(
            config.workflow.clone(),
            pipeline,
            engine,
            acquisition,
            store,
        );
        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub async fn save_value_table(&self) -> anyhow::Result<usize> {
        save_value_table(self.orchestrator.engine(), &self.config.value_table_path()).await
    }
}

/// Import a saved value table. A missing file is an empty table.
pub async fn load_value_table(engine: &RewardEngine, path: &Path) -> anyhow::Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let data = tokio::fs::read_to_string(path).await?;
    let entries: Vec<ValueTableEntry> = serde_json::from_str(&data)
        .map_err(|e| anyhow::anyhow!("Invalid value table '{}': {}", path.display(), e))?;
    let count = entries.len();
    engine.import_table(entries);
    Ok(count)
}

pub async fn save_value_table(engine: &RewardEngine, path: &Path) -> anyhow::Result<usize> {
    let entries = engine.export_table();
    let json = serde_json::to_string_pretty(&entries)?;
    tokio::fs::write(path, json).await?;
    Ok(entries.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use folio_core::AgentRole;
    use folio_learning::{LearningConfig, RewardObservation, StateMap};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_value_table_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value_table.json");

        let engine = RewardEngine::with_seed(LearningConfig::default(), 3);
        assert_eq!(load_value_table(&engine, &path).await.unwrap(), 0);

        let mut state = StateMap::new();
        state.insert("role".into(), serde_json::json!("writer"));
        engine.record(RewardObservation::new(
            Uuid::new_v4(),
            AgentRole::Writer.action_label(),
            80.0,
            state.clone(),
            state.clone(),
        ));
        let saved = save_value_table(&engine, &path).await.unwrap();
        assert_eq!(saved, 1);

        let restored = RewardEngine::with_seed(LearningConfig::default(), 3);
        assert_eq!(load_value_table(&restored, &path).await.unwrap(), 1);
        let action = AgentRole::Writer.action_label();
        assert!((restored.value(&state, &action) - engine.value(&state, &action)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_corrupt_value_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value_table.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        let engine = RewardEngine::new(LearningConfig::default());
        let err = load_value_table(&engine, &path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid value table"));
    }

    #[tokio::test]
    async fn test_build_wires_every_component() {
        let dir = tempfile::tempdir().unwrap();
        let config = FolioConfig::parse(&format!(
            "data_dir = {:?}\n[model]\nprovider = \"openai\"\nmodel_id = \"stub\"\napi_key = \"k\"\n",
            dir.path().join("data")
        ))
        .unwrap();
        let app = App::build(config).await.unwrap();
        assert_eq!(app.orchestrator.pipeline().agents().len(), 3);
        assert!(app.config.content_dir().exists());
        assert!(!app.orchestrator.is_running());
        assert_eq!(app.save_value_table().await.unwrap(), 0);
    }
}
