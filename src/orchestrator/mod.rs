//! Per-project orchestration: durable project state, the project's sandbox
//! session and the streamed planning/iteration operations.
//!
//! Each [`ProjectOrchestrator`] runs one operation at a time. Later requests
//! queue behind the one in flight (FIFO), so sandbox file writes and commands
//! from different operations never interleave.

mod commands;
mod hub;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use commands::{
    iterate_command, plan_command, skill_dir, skill_path, BACKLOG_PATH, CONFIG_PATH,
    DOCUMENT_PATH,
};
pub use hub::Orchestrators;

use crate::config::{Config, DEFAULT_AGENT};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::*;
use crate::sandbox::{ExecOutcome, SandboxError, SandboxProvider, SandboxSession};
use crate::stream::{Completion, FrameSender, FrameStream, ProjectEvent};

const EVENT_CAPACITY: usize = 256;

/// How orchestrators drive their sandboxes.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Agent executable invoked inside the sandbox.
    pub agent: String,
    /// Environment variables injected into every sandbox.
    pub credentials: Vec<(String, String)>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent: config.agent.clone(),
            credentials: config.sandbox_credentials(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            agent: DEFAULT_AGENT.to_string(),
            credentials: Vec::new(),
        }
    }
}

/// Owner of one project's state and sandbox session.
pub struct ProjectOrchestrator {
    identifier: String,
    db: Database,
    provider: Arc<dyn SandboxProvider>,
    settings: OrchestratorSettings,
    operation: Arc<tokio::sync::Mutex<()>>,
    session: Mutex<Option<Arc<dyn SandboxSession>>>,
    running: AtomicBool,
    events: broadcast::Sender<ProjectEvent>,
}

impl ProjectOrchestrator {
    pub fn new(
        identifier: impl Into<String>,
        db: Database,
        provider: Arc<dyn SandboxProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identifier: identifier.into(),
            db,
            provider,
            settings,
            operation: Arc::new(tokio::sync::Mutex::new(())),
            session: Mutex::new(None),
            running: AtomicBool::new(false),
            events,
        }
    }

    /// The state a freshly registered project starts with: seeded skills and
    /// configuration, already set up under `display_name`.
    pub fn seed_state(display_name: &str) -> ProjectState {
        ProjectState {
            display_name: Some(display_name.to_string()),
            ..ProjectState::default()
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Watch every frame and state change of this project from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> Result<ProjectPhase> {
        let state = self.load_state()?;
        Ok(self.phase_for(&state))
    }

    pub fn snapshot(&self) -> Result<ProjectSnapshot> {
        let state = self.load_state()?;
        Ok(self.snapshot_of(state))
    }

    // ============================================================
    // Operations
    // ============================================================

    /// Set the display name. Re-running simply overwrites it.
    pub async fn setup(&self, display_name: &str) -> Result<SetupResponse> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::InvalidInput("display name is required".to_string()));
        }

        let _op = self.operation.lock().await;
        let mut state = self.load_state()?;
        state.display_name = Some(display_name.to_string());
        self.save_state(&state)?;

        info!(project = %self.identifier, display_name, "Project set up");
        Ok(SetupResponse {
            success: true,
            display_name: display_name.to_string(),
        })
    }

    /// Create the sandbox session if needed and (re)write credentials,
    /// configuration and every skill into it.
    pub async fn initialize_sandbox(&self) -> Result<()> {
        let _op = self.operation.lock().await;
        let state = self.load_state()?;
        self.require_setup(&state)?;

        let session = match self.current_session() {
            Some(session) => session,
            None => self.provider.connect(&self.identifier).await?,
        };
        self.provision(&session, &state).await?;
        self.attach_session(session);

        info!(project = %self.identifier, skills = state.skills.len(), "Sandbox initialized");
        self.publish_state(state);
        Ok(())
    }

    /// Replace the configuration document. The sandbox is not touched.
    pub async fn update_config(&self, config_json: &str) -> Result<UpdateConfigResponse> {
        serde_json::from_str::<serde_json::Value>(config_json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let _op = self.operation.lock().await;
        let mut state = self.load_state()?;
        state.config_document = config_json.to_string();
        self.save_state(&state)?;

        info!(project = %self.identifier, "Config updated");
        Ok(UpdateConfigResponse { success: true })
    }

    /// Write the current configuration document into the sandbox.
    pub async fn write_config_to_sandbox(&self) -> Result<WriteConfigResponse> {
        let _op = self.operation.lock().await;
        let state = self.load_state()?;
        let session = self.session_for(&state).await?;
        session
            .write_file(CONFIG_PATH, &state.config_document)
            .await?;

        info!(project = %self.identifier, "Config written to sandbox");
        Ok(WriteConfigResponse {
            success: true,
            message: "Config written to sandbox successfully".to_string(),
        })
    }

    /// Run the planning skill against `description`, streaming its output.
    ///
    /// The terminal frame carries the requirements document and the backlog.
    pub fn plan(self: &Arc<Self>, description: &str) -> Result<FrameStream> {
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(Error::InvalidInput("description is required".to_string()));
        }
        self.require_setup(&self.load_state()?)?;

        let (frames, stream) = FrameSender::new(self.events.clone());
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _op = this.operation.clone().lock_owned().await;
            let result = AssertUnwindSafe(this.run_plan(&description, &frames))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::OperationFailed("planning aborted".to_string())));
            if let Err(e) = &result {
                warn!(project = %this.identifier, error = %e, "Planning failed");
            }
            frames.finish(result);
        });

        Ok(stream)
    }

    /// Ask the implementation skill to continue, streaming its output.
    pub fn iterate(self: &Arc<Self>) -> Result<FrameStream> {
        self.require_setup(&self.load_state()?)?;

        let (frames, stream) = FrameSender::new(self.events.clone());
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _op = this.operation.clone().lock_owned().await;
            let result = AssertUnwindSafe(this.run_iterate(&frames))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::OperationFailed("iteration aborted".to_string())));
            if let Err(e) = &result {
                warn!(project = %this.identifier, error = %e, "Iteration failed");
            }
            frames.finish(result);
        });

        Ok(stream)
    }

    // ============================================================
    // Streamed operation bodies
    // ============================================================

    async fn run_plan(&self, description: &str, frames: &FrameSender) -> Result<Completion> {
        let _running = self.enter_running();
        frames.status("Starting planning...");

        let state = self.load_state()?;
        let session = self.session_for(&state).await?;
        // Blank the previous plan's artifacts so a failed run cannot pass them off as its own.
        for path in [BACKLOG_PATH, DOCUMENT_PATH] {
            session.write_file(path, "").await?;
        }
        let command = plan_command(&self.settings.agent, description);
        self.execute(&session, &command, frames).await?;

        frames.status("Reading generated files...");
        let backlog_source = read_artifact(&session, BACKLOG_PATH).await?;
        let document = read_artifact(&session, DOCUMENT_PATH).await?;

        let backlog = match parse_backlog(&backlog_source) {
            Ok(stories) => stories,
            Err(e) => {
                let err = Error::ArtifactParse {
                    artifact: BACKLOG_PATH.to_string(),
                    reason: e.to_string(),
                };
                warn!(project = %self.identifier, error = %err, "Continuing with an empty backlog");
                Vec::new()
            }
        };

        let mut state = self.load_state()?;
        state.last_document = Some(document.clone());
        state.backlog_source = Some(backlog_source.clone());
        state.backlog = Some(backlog.clone());
        self.save_state(&state)?;

        info!(project = %self.identifier, stories = backlog.len(), "Planning complete");
        Ok(Completion {
            message: None,
            document: Some(document),
            backlog_source: Some(backlog_source),
            backlog: Some(backlog),
        })
    }

    async fn run_iterate(&self, frames: &FrameSender) -> Result<Completion> {
        let _running = self.enter_running();
        frames.status("Starting iteration...");

        let state = self.load_state()?;
        let session = self.session_for(&state).await?;
        let command = iterate_command(&self.settings.agent);
        self.execute(&session, &command, frames).await?;

        info!(project = %self.identifier, "Iteration complete");
        Ok(Completion::message("Iteration complete"))
    }

    async fn execute(
        &self,
        session: &Arc<dyn SandboxSession>,
        command: &str,
        frames: &FrameSender,
    ) -> Result<ExecOutcome> {
        debug!(project = %self.identifier, command, "Running sandbox command");

        let result = session
            .execute(command, &mut |stream, data| frames.output(stream, data))
            .await;

        match result {
            Ok(outcome) => {
                if !outcome.success() {
                    warn!(
                        project = %self.identifier,
                        exit_code = ?outcome.exit_code,
                        "Sandbox command exited unsuccessfully"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                // The session may be gone; the next operation reconnects and re-provisions.
                self.detach_session();
                Err(e.into())
            }
        }
    }

    // ============================================================
    // Sandbox session
    // ============================================================

    fn current_session(&self) -> Option<Arc<dyn SandboxSession>> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    fn attach_session(&self, session: Arc<dyn SandboxSession>) {
        *self.session.lock().expect("session lock poisoned") = Some(session);
    }

    fn detach_session(&self) {
        self.session.lock().expect("session lock poisoned").take();
    }

    /// The live session, connecting and provisioning a new one if there is none.
    async fn session_for(&self, state: &ProjectState) -> Result<Arc<dyn SandboxSession>> {
        if let Some(session) = self.current_session() {
            return Ok(session);
        }

        let session = self.provider.connect(&self.identifier).await?;
        self.provision(&session, state).await?;
        self.attach_session(session.clone());
        info!(project = %self.identifier, "Sandbox session established");
        Ok(session)
    }

    async fn provision(
        &self,
        session: &Arc<dyn SandboxSession>,
        state: &ProjectState,
    ) -> Result<()> {
        session
            .set_environment(self.settings.credentials.clone())
            .await?;

        debug!(project = %self.identifier, "Writing config");
        session
            .write_file(CONFIG_PATH, &state.config_document)
            .await?;

        debug!(project = %self.identifier, "Adding skills");
        for (name, skill) in &state.skills {
            session.make_directory(&skill_dir(name), true).await?;
            session.write_file(&skill_path(name), skill).await?;
        }

        Ok(())
    }

    // ============================================================
    // State
    // ============================================================

    fn load_state(&self) -> Result<ProjectState> {
        Ok(self
            .db
            .get_project_state(&self.identifier)?
            .unwrap_or_default())
    }

    fn save_state(&self, state: &ProjectState) -> Result<()> {
        self.db.save_project_state(&self.identifier, state)?;
        self.publish_state(state.clone());
        Ok(())
    }

    fn publish_state(&self, state: ProjectState) {
        let _ = self.events.send(ProjectEvent::State(self.snapshot_of(state)));
    }

    fn snapshot_of(&self, state: ProjectState) -> ProjectSnapshot {
        ProjectSnapshot {
            identifier: self.identifier.clone(),
            phase: self.phase_for(&state),
            state,
        }
    }

    fn phase_for(&self, state: &ProjectState) -> ProjectPhase {
        if self.running.load(Ordering::SeqCst) {
            ProjectPhase::Running
        } else if state.display_name.is_none() {
            ProjectPhase::Uninitialized
        } else if self.current_session().is_some() {
            ProjectPhase::SandboxReady
        } else {
            ProjectPhase::Configured
        }
    }

    fn require_setup(&self, state: &ProjectState) -> Result<()> {
        if state.display_name.is_none() {
            return Err(Error::InvalidInput(format!(
                "project {} is not set up",
                self.identifier
            )));
        }
        Ok(())
    }

    fn enter_running(&self) -> RunningGuard<'_> {
        self.running.store(true, Ordering::SeqCst);
        RunningGuard(&self.running)
    }
}

/// Leaves the `Running` phase when dropped, whatever the outcome.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn read_artifact(session: &Arc<dyn SandboxSession>, path: &str) -> Result<String> {
    let missing = || Error::OperationFailed(format!("the agent did not produce {}", path));
    match session.read_file(path).await {
        Ok(content) if content.trim().is_empty() => Err(missing()),
        Ok(content) => Ok(content),
        Err(SandboxError::NotFound(_)) => Err(missing()),
        Err(e) => Err(e.into()),
    }
}
