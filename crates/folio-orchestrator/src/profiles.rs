use folio_agent::{AgentConfig, LlmProvider, ModelConfig};
use folio_core::AgentRole;
use serde::{Deserialize, Serialize};

/// The writer → reviewer → editor chain built on one base model config.
/// Each role adjusts temperature and output cap from the base.
pub fn default_agents(base: &ModelConfig) -> Vec<AgentConfig> {
    vec![writer_agent(base), reviewer_agent(base), editor_agent(base)]
}

fn writer_agent(base: &ModelConfig) -> AgentConfig {
    let mut model = base.clone();
    model.temperature = 0.8;
    model.max_tokens = 2000;

    AgentConfig {
        name: "Creative Writer".to_string(),
        role: AgentRole::Writer,
        model,
        system_prompt: WRITER_PROMPT.to_string(),
        instruction: WRITER_INSTRUCTION.to_string(),
    }
}

fn reviewer_agent(base: &ModelConfig) -> AgentConfig {
    let mut model = base.clone();
    model.temperature = 0.3;
    model.max_tokens = 1500;

    AgentConfig {
        name: "Content Reviewer".to_string(),
        role: AgentRole::Reviewer,
        model,
        system_prompt: REVIEWER_PROMPT.to_string(),
        instruction: REVIEWER_INSTRUCTION.to_string(),
    }
}

fn editor_agent(base: &ModelConfig) -> AgentConfig {
    let mut model = base.clone();
    model.temperature = 0.2;
    model.max_tokens = 2000;

    AgentConfig {
        name: "Professional Editor".to_string(),
        role: AgentRole::Editor,
        model,
        system_prompt: EDITOR_PROMPT.to_string(),
        instruction: EDITOR_INSTRUCTION.to_string(),
    }
}

/// Per-role adjustments from an `[[agents]]` entry in `folio.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOverride {
    pub role: AgentRole,
    #[serde(default)]
    pub name: Option<String>,
    /// Switching provider clears the key and base URL so they are re-resolved.
    #[serde(default)]
    pub provider: Option<LlmProvider>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

/// Apply overrides in order; later entries for the same role win.
pub fn apply_overrides(agents: &mut [AgentConfig], overrides: &[AgentOverride]) {
    for ov in overrides {
        let Some(agent) = agents.iter_mut().find(|a| a.role == ov.role) else {
            continue;
        };
        if let Some(name) = &ov.name {
            agent.name = name.clone();
        }
        if let Some(provider) = ov.provider {
            if provider != agent.model.provider {
                agent.model.provider = provider;
                agent.model.api_key.clear();
                agent.model.api_base_url = None;
            }
        }
        if let Some(model_id) = &ov.model_id {
            agent.model.model_id = model_id.clone();
        }
        if let Some(temperature) = ov.temperature {
            agent.model.temperature = temperature;
        }
        if let Some(max_tokens) = ov.max_tokens {
            agent.model.max_tokens = max_tokens;
        }
        if let Some(prompt) = &ov.system_prompt {
            agent.system_prompt = prompt.clone();
        }
        if let Some(instruction) = &ov.instruction {
            agent.instruction = instruction.clone();
        }
    }
}

const WRITER_PROMPT: &str = "\
You are a creative writer who specializes in rewriting and enhancing stories. \
Make content more engaging, vivid, and compelling while maintaining the \
original meaning and story structure.";

const WRITER_INSTRUCTION: &str = "\
Please rewrite the following content in a creative and engaging way while \
maintaining the core story and meaning. Make it more vivid and compelling:";

const REVIEWER_PROMPT: &str = "\
You are a professional content reviewer. Provide constructive feedback, \
identify improvements, and ensure quality and consistency.";

const REVIEWER_INSTRUCTION: &str = "\
Please review the following content and provide constructive feedback, \
suggestions for improvement, and identify any issues:";

const EDITOR_PROMPT: &str = "\
You are a professional editor. Focus on grammar, style, flow, clarity, and \
overall quality. Make specific improvements to enhance readability.";

const EDITOR_INSTRUCTION: &str = "\
Please edit the following content for grammar, style, flow, and overall \
quality. Make specific improvements:";
