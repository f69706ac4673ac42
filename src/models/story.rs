use serde::{Deserialize, Serialize};

/// One entry in a project's backlog, as written by the planning skill.
///
/// `dependencies` may name stories that are not (yet) in the backlog and
/// are not checked for cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub status: StoryStatus,
    pub priority: StoryPriority,
    /// Estimate in story points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint: Option<i64>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_notes: Option<TechnicalNotes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

/// Technical notes come back either as free text or as a list of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TechnicalNotes {
    Text(String),
    List(Vec<String>),
}

/// Where a story is in delivery.
///
/// - `Backlog`: Planned, not started
/// - `InProgress`: Being implemented
/// - `Done`: Implemented and approved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StoryStatus {
    Backlog,
    InProgress,
    Done,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum StoryPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl StoryPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BacklogDocument {
    Stories(Vec<Story>),
    Wrapped { stories: Vec<Story> },
}

/// Parse a backlog document: either a bare array of stories or an object
/// with a `stories` array.
pub fn parse_backlog(source: &str) -> Result<Vec<Story>, serde_json::Error> {
    match serde_json::from_str::<BacklogDocument>(source)? {
        BacklogDocument::Stories(stories) => Ok(stories),
        BacklogDocument::Wrapped { stories } => Ok(stories),
    }
}
