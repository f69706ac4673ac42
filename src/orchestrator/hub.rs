use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::sandbox::SandboxProvider;

use super::{OrchestratorSettings, ProjectOrchestrator};

/// Addresses project orchestrators by identifier.
///
/// The first request for a registered identifier creates its orchestrator;
/// later requests get the same instance, so each project has exactly one
/// owner of its state and sandbox session.
pub struct Orchestrators {
    db: Database,
    provider: Arc<dyn SandboxProvider>,
    settings: OrchestratorSettings,
    live: Mutex<HashMap<String, Arc<ProjectOrchestrator>>>,
}

impl Orchestrators {
    pub fn new(
        db: Database,
        provider: Arc<dyn SandboxProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            db,
            provider,
            settings,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// The orchestrator for a registered project.
    pub fn get(&self, identifier: &str) -> Result<Arc<ProjectOrchestrator>> {
        if !self.db.project_exists(identifier)? {
            return Err(Error::ProjectNotFound(identifier.to_string()));
        }

        let mut live = self.live.lock().expect("orchestrator map lock poisoned");
        let orchestrator = live.entry(identifier.to_string()).or_insert_with(|| {
            tracing::debug!(project = identifier, "Starting project orchestrator");
            Arc::new(ProjectOrchestrator::new(
                identifier,
                self.db.clone(),
                Arc::clone(&self.provider),
                self.settings.clone(),
            ))
        });

        Ok(Arc::clone(orchestrator))
    }
}
