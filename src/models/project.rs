use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{ProjectPhase, ProjectState};

/// A registered project.
///
/// The `identifier` is the normalized, URL-safe key allocated by the registry
/// and is unique across all records. The `display_name` is whatever the user
/// typed and carries no uniqueness guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub identifier: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
}

/// Response for a successful project creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub identifier: String,
}

/// Input for (re)running project setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupInput {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub success: bool,
    pub display_name: String,
}

/// Input for replacing a project's agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigInput {
    pub config_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfigResponse {
    pub success: bool,
    pub message: String,
}

/// Input for the planning operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    pub description: String,
}

/// A project's orchestrator state as seen by observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub identifier: String,
    pub phase: ProjectPhase,
    pub state: ProjectState,
}
