use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Ordered `(name, sql)` pairs. A database at `PRAGMA user_version = n` has
/// the first `n` applied.
const MIGRATIONS: &[(&str, &str)] = &[
    ("projects", include_str!("migrations/001_projects.sql")),
    ("project_state", include_str!("migrations/002_project_state.sql")),
];

/// Bring the schema up to date, one transaction per step.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > MIGRATIONS.len() {
        bail!(
            "database schema version {} is newer than this build supports ({})",
            current,
            MIGRATIONS.len()
        );
    }

    for (index, (name, sql)) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to apply migration {} ({})", version, name))?;
        tx.pragma_update(None, "user_version", version as i64)?;
        tx.commit()?;
        tracing::info!(version, name, "Applied migration");
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read schema version")?;
    Ok(version as usize)
}
