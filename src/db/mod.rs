mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::models::*;

const RECENT_PROJECTS_KEY: &str = "recent_projects";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Project registry operations
    // ============================================================

    /// Register a new project under the first free identifier among
    /// `candidates`, together with its initial state document and its place
    /// at the front of the recent-projects list.
    ///
    /// Everything is written in one transaction under the connection lock:
    /// either the project exists with its state and recent entry, or nothing
    /// was written. The primary key makes the existence check and the insert
    /// a single step, so concurrent callers never win the same identifier.
    /// Returns `None` when every candidate is taken.
    pub fn register_project(
        &self,
        candidates: impl IntoIterator<Item = String>,
        display_name: &str,
        state: &ProjectState,
        recent_cap: usize,
    ) -> Result<Option<ProjectRecord>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now();
        let created_at = now.to_rfc3339_opts(SecondsFormat::Nanos, true);

        let mut identifier = None;
        for candidate in candidates {
            let rows = tx.execute(
                "INSERT OR IGNORE INTO projects (identifier, display_name, created_at)
                 VALUES (?, ?, ?)",
                (&candidate, display_name, &created_at),
            )?;
            if rows == 1 {
                identifier = Some(candidate);
                break;
            }
        }
        let Some(identifier) = identifier else {
            return Ok(None);
        };

        write_project_state(&tx, &identifier, state)?;
        push_recent_project(&tx, &identifier, recent_cap)?;
        tx.commit()?;

        Ok(Some(ProjectRecord {
            identifier,
            display_name: display_name.to_string(),
            created_at: now,
        }))
    }

    pub fn get_all_projects(&self) -> Result<Vec<ProjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT identifier, display_name, created_at
             FROM projects ORDER BY created_at DESC, rowid DESC",
        )?;

        let projects = stmt
            .query_map([], |row| {
                Ok(ProjectRecord {
                    identifier: row.get(0)?,
                    display_name: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, identifier: &str) -> Result<Option<ProjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let project = conn
            .query_row(
                "SELECT identifier, display_name, created_at FROM projects WHERE identifier = ?",
                [identifier],
                |row| {
                    Ok(ProjectRecord {
                        identifier: row.get(0)?,
                        display_name: row.get(1)?,
                        created_at: parse_datetime(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(project)
    }

    pub fn project_exists(&self, identifier: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE identifier = ?",
            [identifier],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_recent_projects(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        read_recent_projects(&conn)
    }

    // ============================================================
    // Project state operations
    // ============================================================

    pub fn get_project_state(&self, identifier: &str) -> Result<Option<ProjectState>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM project_state WHERE identifier = ?",
                [identifier],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_project_state(&self, identifier: &str, state: &ProjectState) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        write_project_state(&conn, identifier, state)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn write_project_state(conn: &Connection, identifier: &str, state: &ProjectState) -> Result<()> {
    conn.execute(
        "INSERT INTO project_state (identifier, document, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(identifier) DO UPDATE SET
            document = excluded.document,
            updated_at = excluded.updated_at",
        (identifier, serde_json::to_string(state)?, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

/// Move `identifier` to the front of the recent-projects list, dropping
/// duplicates and keeping at most `cap` entries.
fn push_recent_project(conn: &Connection, identifier: &str, cap: usize) -> Result<()> {
    let mut recent = read_recent_projects(conn)?;
    recent.retain(|existing| existing != identifier);
    recent.insert(0, identifier.to_string());
    recent.truncate(cap);

    conn.execute(
        "INSERT INTO registry_state (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (RECENT_PROJECTS_KEY, serde_json::to_string(&recent)?),
    )?;
    Ok(())
}

fn read_recent_projects(conn: &Connection) -> Result<Vec<String>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM registry_state WHERE key = ?",
            [RECENT_PROJECTS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
