use folio_agent::{LlmProvider, ModelConfig};
use folio_builtins::AcquisitionConfig;
use folio_learning::LearningConfig;
use folio_orchestrator::{AgentOverride, WorkflowConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of `folio.toml`. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct FolioConfig {
    /// Root for the value table and stored content.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Base model shared by the three default agents.
    #[serde(default = "default_model")]
    pub model: ModelConfig,
    /// Per-role changes on top of `model`.
    #[serde(default)]
    pub agents: Vec<AgentOverride>,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./folio-data")
}

fn default_model() -> ModelConfig {
    ModelConfig::new(LlmProvider::OpenAi, "gpt-4")
}

impl FolioConfig {
    /// Parse TOML text; missing sections take their defaults.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file. A missing file is an error.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&text)
    }

    /// Where the learned value table is saved between runs.
    pub fn value_table_path(&self) -> PathBuf {
        self.data_dir.join("value_table.json")
    }

    /// Directory of the file-backed content store.
    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("content")
    }
}
