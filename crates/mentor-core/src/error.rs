use thiserror::Error;

/// Top-level error type shared by every Mentor crate.
///
/// The first five variants are the gateway failure taxonomy the orchestrator
/// reacts to. The remaining variants cover configuration and local I/O.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MentorError {
    #[error("Memory store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MentorError {
    /// Whether a single retry may succeed.
    ///
    /// Only provider hiccups and completion failures qualify; missing
    /// credentials and a dead memory store will not heal within one turn.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MentorError::ProviderUnavailable(_) | MentorError::CompletionFailed(_)
        )
    }
}

impl From<toml::de::Error> for MentorError {
    fn from(err: toml::de::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MentorError {
    fn from(err: toml::ser::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(err: serde_json::Error) -> Self {
        MentorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Mentor operations.
pub type Result<T> = std::result::Result<T, MentorError>;
