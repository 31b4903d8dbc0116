use thiserror::Error;

/// A convenience `Result` alias using [`FolioError`].
pub type FolioResult<T> = Result<T, FolioError>;

/// Top-level error type for the Folio workspace.
///
/// A feedback timeout is deliberately absent: an empty rendezvous drain is a
/// valid "no input" outcome, not a failure.
#[derive(Error, Debug)]
pub enum FolioError {
    /// The source could not be reached or parsed.
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// The generative model is unsupported, over quota, or unreachable.
    #[error("Generation error: {0}")]
    Generation(String),

    /// The content store is unavailable or rejected a write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Bad start options, out-of-range ratings, or illegal status moves.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A workflow is already active on this orchestrator.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced work unit or chapter does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The in-flight step was interrupted by a pause or skip request.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Configuration parsing or validation failed.
    #[error("Config error: {0}")]
    Config(String),

    /// An outbound HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FolioError {
    /// Whether this error came from a pause/skip interrupt rather than a real failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, FolioError::Interrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FolioError::Conflict("workflow already active".into());
        assert_eq!(err.to_string(), "Conflict: workflow already active");

        let err = FolioError::Generation("unsupported model: foo".into());
        assert!(err.to_string().starts_with("Generation error"));
    }

    #[test]
    fn test_is_interrupted() {
        assert!(FolioError::Interrupted("paused".into()).is_interrupted());
        assert!(!FolioError::Validation("bad".into()).is_interrupted());
    }

    #[test]
    fn test_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: FolioError = parse.unwrap_err().into();
        assert!(matches!(err, FolioError::Serialization(_)));
    }
}
