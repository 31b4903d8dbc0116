//! Generative agents and their provider backends.
//!
//! A [`SpinAgent`] wraps one model behind an [`LlmClient`], builds its role
//! prompt, runs a single generation per call, and scores the result into a
//! [`folio_core::SpinRecord`] plus a reward observation for the learner.

pub mod agent;
pub mod backends;
pub mod config;
pub mod failover;
pub mod llm;
pub mod quality;

pub use agent::{AgentConfig, SpinAgent, SpinContext, SpinOutcome};
pub use backends::{GenerationBackend, GenerationRequest};
pub use config::{LlmProvider, ModelConfig};
pub use failover::{FailoverBackend, RetryPolicy};
pub use llm::LlmClient;
pub use quality::{assess_content_quality, feedback_score};
