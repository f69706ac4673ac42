//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::stream::Frame;

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectRequest {
    #[schemars(
        description = "Human-readable project name. It is normalized into a URL-safe identifier; duplicates get a numeric suffix."
    )]
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProjectRequest {
    #[schemars(description = "The project identifier returned by create_project")]
    pub identifier: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetupProjectRequest {
    #[schemars(description = "The project identifier")]
    pub identifier: String,
    #[schemars(description = "Display name to show for the project")]
    pub display_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateConfigRequest {
    #[schemars(description = "The project identifier")]
    pub identifier: String,
    #[schemars(description = "Complete agent configuration as a JSON document (text)")]
    pub config_json: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlanRequest {
    #[schemars(description = "The project identifier")]
    pub identifier: String,
    #[schemars(
        description = "What the app should do, in plain language. The planning skill turns it into a requirements document and a story backlog."
    )]
    pub description: String,
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedProject {
    pub identifier: String,
}

/// Every frame of a streamed operation, terminal frame last.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamTranscript {
    pub succeeded: bool,
    pub frames: Vec<Frame>,
}

impl StreamTranscript {
    pub fn new(frames: Vec<Frame>) -> Self {
        let succeeded = matches!(frames.last(), Some(Frame::Complete(_)));
        Self { succeeded, frames }
    }

    pub fn terminal(&self) -> Option<&Frame> {
        self.frames.last().filter(|frame| frame.is_terminal())
    }
}
