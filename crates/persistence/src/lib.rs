//! # Leadflow Persistence
//!
//! SQLite persistence layer for leads, users, notes and follow-ups.
//!
//! The store contract the services rely on:
//! - per-record conditional updates (`LeadRepo::update_guarded`) for the
//!   status state machine;
//! - indexed lookups by status/owner/team/date;
//! - no multi-record transactions.
//!
//! Audit records live in their own store owned by the audit crate.

pub mod error;
pub mod repos;
pub mod schema;

pub use error::{PersistenceError, PersistenceResult};
pub use repos::{FollowUpRepo, LeadRepo, NoteRepo, UserRepo};
pub use schema::{FollowUpRow, LeadRow, NoteRow, UserRow};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Embedded schema; executed by `run_migrations`
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    email              TEXT NOT NULL,
    team               TEXT NOT NULL,
    role               TEXT NOT NULL,
    is_active          INTEGER NOT NULL DEFAULT 1,
    leads_created      INTEGER NOT NULL DEFAULT 0,
    leads_converted    INTEGER NOT NULL DEFAULT 0,
    campaigns_managed  INTEGER NOT NULL DEFAULT 0,
    total_revenue      TEXT NOT NULL DEFAULT '0',
    created_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leads (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    artist_name        TEXT,
    source             TEXT NOT NULL,
    platform           TEXT NOT NULL,
    assigned_to        TEXT NOT NULL REFERENCES users(id),
    team               TEXT NOT NULL,
    status             TEXT NOT NULL,
    priority           TEXT NOT NULL,
    quality            TEXT NOT NULL,
    email              TEXT,
    phone              TEXT,
    budget             TEXT,
    deal_value         TEXT,
    commission         TEXT,
    commission_rate    TEXT,
    monthly_listeners  INTEGER,
    instagram          TEXT,
    tiktok_handle      TEXT,
    website            TEXT,
    label              TEXT,
    lead_score         INTEGER NOT NULL DEFAULT 0,
    follow_up_count    INTEGER NOT NULL DEFAULT 0,
    lost_reason        TEXT,
    first_contact_date TEXT,
    last_contact_date  TEXT,
    last_activity_date TEXT,
    won_date           TEXT,
    lost_date          TEXT,
    next_follow_up     TEXT,
    is_archived        INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
CREATE INDEX IF NOT EXISTS idx_leads_owner ON leads(assigned_to);
CREATE INDEX IF NOT EXISTS idx_leads_team ON leads(team);
CREATE INDEX IF NOT EXISTS idx_leads_created ON leads(created_at);
CREATE INDEX IF NOT EXISTS idx_leads_archived ON leads(is_archived);

CREATE TABLE IF NOT EXISTS notes (
    id          TEXT PRIMARY KEY,
    lead_id     TEXT NOT NULL REFERENCES leads(id),
    author      TEXT NOT NULL,
    content     TEXT NOT NULL,
    note_type   TEXT NOT NULL,
    is_private  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_lead ON notes(lead_id);

CREATE TABLE IF NOT EXISTS follow_ups (
    id            TEXT PRIMARY KEY,
    lead_id       TEXT NOT NULL REFERENCES leads(id),
    scheduled_by  TEXT NOT NULL,
    due_at        TEXT NOT NULL,
    kind          TEXT NOT NULL,
    completed     INTEGER NOT NULL DEFAULT 0,
    completed_at  TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_follow_ups_lead ON follow_ups(lead_id);
CREATE INDEX IF NOT EXISTS idx_follow_ups_due ON follow_ups(due_at);
"#;

/// Create a connection pool for the given SQLite URL
/// (e.g. `sqlite:leadflow.db?mode=rwc` or `sqlite::memory:`).
pub async fn create_pool(db_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the core tables and indexes (idempotent)
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| PersistenceError::Migration(e.to_string()))?;
    Ok(())
}

/// Connect and migrate in one step
pub async fn init_database(db_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(db_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<_> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"users"));
        assert!(names.contains(&"leads"));
        assert!(names.contains(&"notes"));
        assert!(names.contains(&"follow_ups"));
    }

    #[tokio::test]
    async fn test_init_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadflow.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = init_database(&url).await.unwrap();
        pool.close().await;

        assert!(path.exists());
    }
}
