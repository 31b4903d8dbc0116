//! Spoken or typed control commands.
//!
//! A recognition front-end turns a transcript into a [`VoiceCommand`]; the
//! orchestrator maps the fixed [`CommandAction`] set onto its own control
//! operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The fixed set of actions the orchestrator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Pause,
    Resume,
    Skip,
    ProvideFeedback,
    Approve,
    Reject,
    Rate,
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandAction::Pause => "pause",
            CommandAction::Resume => "resume",
            CommandAction::Skip => "skip",
            CommandAction::ProvideFeedback => "provide_feedback",
            CommandAction::Approve => "approve",
            CommandAction::Reject => "reject",
            CommandAction::Rate => "rate",
        };
        f.write_str(s)
    }
}

/// A parsed command event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCommand {
    pub id: Uuid,
    pub user_id: String,
    pub action: CommandAction,
    pub transcript: String,
    /// Extracted parameters such as `rating` or `suggestions`.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl VoiceCommand {
    pub fn new(action: CommandAction, transcript: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: "voice_user".to_string(),
            action,
            transcript: transcript.into(),
            parameters: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// The `rating` parameter, if present and numeric.
    pub fn rating(&self) -> Option<f64> {
        self.parameters.get("rating").and_then(serde_json::Value::as_f64)
    }

    /// The `suggestions` parameter as a list of strings.
    pub fn suggestions(&self) -> Vec<String> {
        self.parameters
            .get("suggestions")
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
