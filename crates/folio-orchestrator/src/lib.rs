//! Workflow orchestration for the writer → reviewer → editor pipeline.
//!
//! Drives one book at a time through acquisition, the agent chain, optional
//! bounded human review, adaptive reward tuning, and persistence, publishing
//! lifecycle events as it goes.
//!
//! # Main types
//!
//! - [`WorkflowOrchestrator`]: Top-level state machine and control surface.
//! - [`AgentPipeline`]: The fixed three-agent chain for one pass.
//! - [`FeedbackRendezvous`]: Timeout-bounded per-chapter feedback mailbox.
//! - [`AgentMonitor`]: Agent activity and chapter throughput.
//! - [`WorkflowEvent`]: Lifecycle notifications.

/// Orchestrator settings.
pub mod config;
/// Workflow state machine and public operations.
pub mod engine;
/// Agent activity monitoring.
pub mod monitor;
/// Agent chain and pass execution.
pub mod pipeline;
/// Default agent profiles and per-role overrides.
pub mod profiles;
/// Human feedback rendezvous.
pub mod rendezvous;
/// Per-run session state and handle.
pub mod session;
/// Options, events, and result types.
pub mod types;

pub use config::WorkflowConfig;
pub use engine::{chapter_refs, WorkflowOrchestrator, CHAPTER_MARKER};
pub use monitor::AgentMonitor;
pub use pipeline::{AgentPipeline, PassContext};
pub use profiles::{apply_overrides, default_agents, AgentOverride};
pub use rendezvous::FeedbackRendezvous;
pub use session::{WorkflowHandle, WorkflowSession};
pub use types::{
    AgentActivity, AgentMetrics, BookStats, ExportedBook, PerformanceMetrics, ProcessingStats,
    SearchResults, WorkerStatus, WorkflowEvent, WorkflowOptions,
};
