use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::story::Story;

/// Skill definitions seeded into every new project.
pub const DEFAULT_SKILLS: &[(&str, &str)] = &[
    (
        "demo-app-planner",
        include_str!("../skills/demo-app-planner.md"),
    ),
    ("implement-story", include_str!("../skills/implement-story.md")),
    ("approve-story", include_str!("../skills/approve-story.md")),
];

/// The durable state owned by one project's orchestrator.
///
/// `config_document` is JSON text; it is validated when replaced, not on
/// every read. `backlog_source` keeps the backlog exactly as the sandbox
/// produced it, even when it failed to parse into `backlog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub skills: BTreeMap<String, String>,
    pub config_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<Vec<Story>>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            display_name: None,
            skills: DEFAULT_SKILLS
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
            config_document: default_config_document(),
            last_document: None,
            backlog_source: None,
            backlog: None,
        }
    }
}

/// The agent configuration every project starts with.
pub fn default_config_document() -> String {
    serde_json::json!({
        "$schema": "https://opencode.ai/config.json",
        "provider": {
            "cloudflare-ai-gateway": {
                "models": {
                    "openai/gpt-4o": {},
                    "anthropic/claude-sonnet-4": {}
                }
            }
        },
        "mcp": {
            "cloudflare-developer-documentation": {
                "type": "remote",
                "url": "https://docs.mcp.cloudflare.com/mcp",
                "enabled": true
            }
        },
        "tools": {
            "skill": true
        }
    })
    .to_string()
}

/// Lifecycle of a project orchestrator.
///
/// - `Uninitialized`: No display name yet; setup has not run
/// - `Configured`: Set up, no live sandbox session
/// - `SandboxReady`: A provisioned sandbox session is attached
/// - `Running`: A streamed operation is executing; always returns to `SandboxReady`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Uninitialized,
    Configured,
    SandboxReady,
    Running,
}

impl ProjectPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::SandboxReady => "sandbox_ready",
            Self::Running => "running",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_seeds_all_skills() {
        let state = ProjectState::default();
        assert_eq!(state.skills.len(), 3);
        assert!(state.skills.contains_key("demo-app-planner"));
        assert!(state.display_name.is_none());
    }

    #[test]
    fn default_config_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(&default_config_document()).unwrap();
        assert_eq!(value["tools"]["skill"], true);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(ProjectState::default()).unwrap();
        assert!(json.get("configDocument").is_some());
        assert!(json.get("lastDocument").is_none());
    }
}
