//! Reference collaborators for the workflow orchestrator.
//!
//! - [`HttpAcquisition`]: plain HTTP chapter acquisition.
//! - [`CommandParser`]: transcript to [`folio_core::VoiceCommand`] parsing.

pub mod http_fetch;
pub mod voice;

pub use http_fetch::{AcquisitionConfig, HttpAcquisition};
pub use voice::CommandParser;
