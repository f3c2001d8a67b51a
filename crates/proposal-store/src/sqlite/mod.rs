//! SQLite implementation of [`Datastore`].
//!
//! Every transaction is opened with `BEGIN IMMEDIATE`, which takes the
//! database write lock up front. Two service instances pointed at the same
//! database file therefore serialize their transactions; the loser waits up
//! to `busy_timeout` before failing with a storage error.
//!
//! Invariants also hold at the schema level:
//! - `UNIQUE (proposal_id, version_number)` on versions
//! - `UNIQUE (proposal_id)` on projects
//! - a partial unique index allowing one active proposal per team
//!
//! # Schema Versioning
//!
//! `schema_version` records the applied schema. Bump
//! `CURRENT_SCHEMA_VERSION` and add a step to `run_migrations()` when the
//! schema changes.

mod rows;
mod tx;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::repository::{Datastore, StoreTx};
use tx::SqliteTx;

/// Current schema version.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// How long a transaction waits for another writer before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// SQLite-backed datastore.
///
/// Runs synchronous rusqlite calls on `tokio::task::spawn_blocking` so the
/// async runtime never blocks on disk or lock waits.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// # Errors
    /// `StoreError::Storage` if the file cannot be opened, configured or
    /// migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory {
            if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::storage(
                        "create database directory",
                        format!("{}: {}", parent.display(), e),
                    )
                })?;
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e))?;
        if !journal_mode.eq_ignore_ascii_case("wal")
            && !(is_in_memory && journal_mode.eq_ignore_ascii_case("memory"))
        {
            warn!(
                "SQLite kept journal_mode '{}' instead of WAL; concurrent readers will block",
                journal_mode
            );
        }

        conn.execute_batch(&format!(
            "PRAGMA synchronous = FULL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))
        .map_err(|e| StoreError::storage("configure pragmas", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;
        debug!(path = %path_str, "opened sqlite datastore");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database (tests, demos)
    ///
    /// # Errors
    /// See [`SqliteStore::open`].
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "database schema version {from_version} is newer than supported version \
                     {CURRENT_SCHEMA_VERSION}"
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS proposals (
                    id TEXT PRIMARY KEY,
                    team_id INTEGER,
                    reviewer_id INTEGER,
                    status TEXT NOT NULL,
                    created_by INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    first_submitted_at TEXT,
                    archived_at TEXT
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_one_active_proposal_per_team
                    ON proposals(team_id)
                    WHERE team_id IS NOT NULL
                      AND archived_at IS NULL
                      AND status NOT IN ('approved', 'rejected');
                CREATE INDEX IF NOT EXISTS idx_proposals_created
                    ON proposals(created_at DESC);

                CREATE TABLE IF NOT EXISTS proposal_versions (
                    id TEXT PRIMARY KEY,
                    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
                    version_number INTEGER NOT NULL CHECK (version_number >= 1),
                    title TEXT NOT NULL,
                    problem_statement TEXT NOT NULL,
                    objectives TEXT NOT NULL,
                    methodology TEXT NOT NULL,
                    timeline TEXT NOT NULL,
                    expected_outcomes TEXT NOT NULL,
                    file_url TEXT,
                    file_sha256 TEXT,
                    file_size INTEGER,
                    is_approved INTEGER NOT NULL DEFAULT 0,
                    locked_at TEXT,
                    created_by INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (proposal_id, version_number)
                );

                CREATE TABLE IF NOT EXISTS decisions (
                    id TEXT PRIMARY KEY,
                    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
                    version_id TEXT NOT NULL REFERENCES proposal_versions(id) ON DELETE CASCADE,
                    reviewer_id INTEGER NOT NULL,
                    kind TEXT NOT NULL,
                    justification TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_decisions_proposal
                    ON decisions(proposal_id);

                CREATE TABLE IF NOT EXISTS projects (
                    id TEXT PRIMARY KEY,
                    proposal_id TEXT NOT NULL UNIQUE REFERENCES proposals(id),
                    approved_version_id TEXT NOT NULL REFERENCES proposal_versions(id),
                    title TEXT NOT NULL,
                    problem_statement TEXT NOT NULL,
                    objectives TEXT NOT NULL,
                    expected_outcomes TEXT NOT NULL,
                    team_id INTEGER NOT NULL,
                    department_id INTEGER,
                    approved_by INTEGER NOT NULL,
                    visibility TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e))?;

        Ok(())
    }
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn transact<F, R, E>(&self, work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| E::from(tx::classify("begin transaction", e)))?;

            // Dropping `tx` without commit rolls back.
            let out = work(&mut SqliteTx::new(&tx))?;

            tx.commit()
                .map_err(|e| E::from(tx::classify("commit", e)))?;
            Ok(out)
        })
        .await
        .map_err(|e| E::from(StoreError::storage("join blocking task", e)))?
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
