use thiserror::Error;

use crate::sandbox::SandboxError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the registry and project orchestrators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unable to allocate a unique identifier for '{0}'")]
    AllocationExhausted(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(#[from] SandboxError),

    /// Recoverable; callers log it and continue with an empty backlog.
    #[error("Failed to parse {artifact}: {reason}")]
    ArtifactParse { artifact: String, reason: String },

    /// A streamed operation could not finish; surfaces as an `error` frame.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.into())
    }
}
