//! Core types and error definitions for the Folio workspace.
//!
//! This crate provides the foundational types shared across all Folio crates:
//! the error taxonomy, the book/chapter data model, the traits for external
//! collaborators, and the cooperative control signal used to pause or skip
//! an in-flight workflow.
//!
//! # Main types
//!
//! - [`FolioError`]: Unified error enum for all Folio subsystems.
//! - [`FolioResult`]: Convenience alias for `Result<T, FolioError>`.
//! - [`WorkUnit`] / [`Chapter`]: The book being transformed and its chapters.
//! - [`SpinRecord`]: One agent's transformation attempt with its reward.
//! - [`HumanFeedback`]: A reviewer submission targeted at a chapter.
//! - [`WorkflowState`]: Snapshot of the running workflow.
//! - [`AcquisitionService`]: Trait for fetching raw chapter text.
//! - [`RunControl`] / [`Interrupt`]: Pause/skip signalling for a run.

/// Acquisition service trait and its result type.
pub mod acquisition;
/// Spoken/typed command types.
pub mod command;
/// Cooperative pause/skip control for a running workflow.
pub mod control;
/// Error taxonomy.
pub mod error;
/// Book, chapter, feedback, and workflow state types.
pub mod model;

pub use acquisition::{AcquiredDocument, AcquisitionService};
pub use command::{CommandAction, VoiceCommand};
pub use control::{ControlState, Interrupt, RunControl};
pub use error::{FolioError, FolioResult};
pub use model::{
    AgentRole, BookMetadata, Chapter, ChapterStatus, HumanFeedback, SpinMetadata, SpinRecord,
    WorkUnit, WorkflowState,
};
