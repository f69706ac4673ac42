//! Shared fixtures: an in-memory sandbox whose command behavior is scripted.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backlog_forge::db::Database;
use backlog_forge::orchestrator::OrchestratorSettings;
use backlog_forge::registry::ProjectRegistry;
use backlog_forge::sandbox::{
    ExecOutcome, OutputStream, SandboxError, SandboxProvider, SandboxSession,
};

pub const VALID_BACKLOG: &str = r#"[
    {"id": "STORY-001", "title": "Add todo", "status": "backlog", "priority": "high",
     "points": 2, "sprint": 1, "description": "Users can add a todo",
     "acceptanceCriteria": ["todo appears in list"]},
    {"id": "STORY-002", "title": "Complete todo", "status": "backlog", "priority": "medium",
     "description": "Users can tick a todo", "dependencies": ["STORY-001"]}
]"#;

pub const DOCUMENT: &str = "# Todo App\n\nA tiny todo app.\n";

/// What a scripted command does when executed.
#[derive(Clone, Default)]
pub struct Script {
    pub chunks: Vec<(OutputStream, String)>,
    /// Files the command leaves behind.
    pub writes: Vec<(String, String)>,
    pub fail: bool,
    pub exit_code: i32,
    pub panic: bool,
    pub delay: Option<Duration>,
}

impl Script {
    pub fn planning(backlog: &str, document: &str) -> Self {
        Self {
            chunks: vec![
                (OutputStream::Primary, "Planning...\n".to_string()),
                (OutputStream::Secondary, "warn: slow model\n".to_string()),
                (OutputStream::Primary, "Wrote prd.md\n".to_string()),
            ],
            writes: vec![
                ("stories.json".to_string(), backlog.to_string()),
                ("prd.md".to_string(), document.to_string()),
            ],
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct ScriptedSandbox {
    pub files: Mutex<HashMap<String, String>>,
    pub directories: Mutex<Vec<String>>,
    pub env: Mutex<Vec<(String, String)>>,
    pub commands: Mutex<Vec<String>>,
    pub script: Mutex<Script>,
    active: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl ScriptedSandbox {
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxSession for ScriptedSandbox {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        self.file(path)
            .ok_or_else(|| SandboxError::NotFound(path.to_string()))
    }

    async fn make_directory(&self, path: &str, _recursive: bool) -> Result<(), SandboxError> {
        self.directories.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn set_environment(&self, vars: Vec<(String, String)>) -> Result<(), SandboxError> {
        *self.env.lock().unwrap() = vars;
        Ok(())
    }

    async fn execute(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputStream, String) + Send),
    ) -> Result<ExecOutcome, SandboxError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(active, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_string());

        let script = self.script.lock().unwrap().clone();
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        for (stream, data) in script.chunks {
            on_output(stream, data);
        }

        if script.panic {
            self.active.fetch_sub(1, Ordering::SeqCst);
            panic!("agent crashed");
        }

        let result = if script.fail {
            Err(SandboxError::Exec("container went away".to_string()))
        } else {
            for (path, content) in script.writes {
                self.files.lock().unwrap().insert(path, content);
            }
            Ok(ExecOutcome {
                exit_code: Some(script.exit_code),
            })
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Hands out one shared [`ScriptedSandbox`] and counts connections.
#[derive(Default)]
pub struct ScriptedProvider {
    pub sandbox: Arc<ScriptedSandbox>,
    pub connects: AtomicUsize,
    pub unavailable: std::sync::atomic::AtomicBool,
}

impl ScriptedProvider {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SandboxProvider for ScriptedProvider {
    async fn connect(&self, _identifier: &str) -> Result<Arc<dyn SandboxSession>, SandboxError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SandboxError::Connect("no capacity".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.sandbox.clone())
    }
}

pub fn test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        agent: "opencode".to_string(),
        credentials: vec![("CLOUDFLARE_API_TOKEN".to_string(), "secret".to_string())],
    }
}

pub fn setup() -> (ProjectRegistry, Arc<ScriptedProvider>) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let provider = Arc::new(ScriptedProvider::default());
    let registry = ProjectRegistry::new(db, provider.clone(), test_settings());
    (registry, provider)
}
