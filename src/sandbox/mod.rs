//! Isolated execution environments, one per project.
//!
//! The orchestrator only sees [`SandboxSession`] and [`SandboxProvider`]; every
//! call is treated as a possibly slow, possibly failing remote operation.
//! [`LocalSandboxProvider`] backs each session with a directory and `sh`.

mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::{LocalSandbox, LocalSandboxProvider};

/// Which output channel of a sandbox command a chunk came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Standard output
    Primary,
    /// Standard error
    Secondary,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Result of a command that ran to completion.
///
/// A non-zero exit is not an error at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("could not establish sandbox: {0}")]
    Connect(String),

    #[error("path is outside the sandbox: {0}")]
    InvalidPath(String),

    #[error("file not found in sandbox: {0}")]
    NotFound(String),

    #[error("command could not run: {0}")]
    Exec(String),

    #[error("sandbox I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A live handle to one project's sandbox.
///
/// Implementations are not required to support concurrent `execute` calls;
/// the orchestrator never issues them.
#[async_trait]
pub trait SandboxSession: Send + Sync {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError>;

    async fn read_file(&self, path: &str) -> Result<String, SandboxError>;

    async fn make_directory(&self, path: &str, recursive: bool) -> Result<(), SandboxError>;

    /// Replace the environment used by subsequent commands.
    async fn set_environment(&self, vars: Vec<(String, String)>) -> Result<(), SandboxError>;

    /// Run `command` to completion, handing each output chunk to `on_output`
    /// in the order it was produced.
    async fn execute(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputStream, String) + Send),
    ) -> Result<ExecOutcome, SandboxError>;
}

/// Creates (or reattaches to) the sandbox belonging to a project.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn connect(&self, identifier: &str) -> Result<Arc<dyn SandboxSession>, SandboxError>;
}

/// Name of the sandbox backing a project.
pub fn sandbox_name(identifier: &str) -> String {
    format!("box-{}", identifier)
}
