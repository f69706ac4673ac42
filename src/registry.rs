//! The project registry: allocates identifiers and remembers every project.

use std::sync::Arc;

use tracing::info;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::ProjectRecord;
use crate::names;
use crate::orchestrator::{OrchestratorSettings, Orchestrators, ProjectOrchestrator};
use crate::sandbox::SandboxProvider;

/// Number of candidates (`base`, `base-2`, ... `base-1000`) tried before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 1000;

/// Length of the recent-projects list.
pub const RECENT_PROJECTS_CAP: usize = 10;

/// Maps user-supplied names to unique project identifiers and hands each
/// new project to its orchestrator.
#[derive(Clone)]
pub struct ProjectRegistry {
    db: Database,
    orchestrators: Arc<Orchestrators>,
}

impl ProjectRegistry {
    pub fn new(
        db: Database,
        provider: Arc<dyn SandboxProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        let orchestrators = Arc::new(Orchestrators::new(db.clone(), provider, settings));
        Self { db, orchestrators }
    }

    /// Register a project under a fresh identifier derived from `raw_name`.
    ///
    /// Taken identifiers get `-2`, `-3`, ... appended. Concurrent calls with
    /// the same name always receive distinct identifiers. The record, the
    /// orchestrator's initial state and the recent-list entry are stored
    /// together, so a failure leaves no half-registered project behind.
    pub fn create_project(&self, raw_name: &str) -> Result<String> {
        let display_name = raw_name.trim();
        let base = names::normalize(display_name);
        if !base.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "'{}' does not contain any letters or digits",
                raw_name
            )));
        }

        let candidates = (1..=MAX_ALLOCATION_ATTEMPTS).map(|n| names::candidate(&base, n));
        let state = ProjectOrchestrator::seed_state(display_name);
        let record = self
            .db
            .register_project(candidates, display_name, &state, RECENT_PROJECTS_CAP)?
            .ok_or_else(|| Error::AllocationExhausted(base.clone()))?;

        info!(project = %record.identifier, display_name, "Project created");
        Ok(record.identifier)
    }

    /// Every project, newest first.
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        Ok(self.db.get_all_projects()?)
    }

    pub fn exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.db.project_exists(identifier)?)
    }

    pub fn get(&self, identifier: &str) -> Result<ProjectRecord> {
        self.db
            .get_project(identifier)?
            .ok_or_else(|| Error::ProjectNotFound(identifier.to_string()))
    }

    /// Identifiers of the most recently created projects, newest first.
    pub fn recent_projects(&self) -> Result<Vec<String>> {
        Ok(self.db.get_recent_projects()?)
    }

    /// The orchestrator owning a registered project.
    pub fn orchestrator(&self, identifier: &str) -> Result<Arc<ProjectOrchestrator>> {
        self.orchestrators.get(identifier)
    }
}
