#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Report storage for traffic reporter.
//!
//! Reports and the per-cause lookup table live in a single `DuckDB`
//! database. Schema changes are plain SQL files embedded from the
//! `migrations/` directory and applied in file-name order. The geo-distance
//! function used by the merge radius check is installed by a migration as a
//! SQL macro, so every distance comparison happens inside the store.

pub mod causes;
pub mod db;
pub mod dedup;
pub mod filter;
pub mod paths;
pub mod reports;

use duckdb::Connection;
use include_dir::{Dir, File, include_dir};
use traffic_reporter_report_models::Cause;
use uuid::Uuid;

pub use duckdb;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A migration file could not be applied.
    #[error("Migration {name} failed: {message}")]
    Migration {
        /// Migration file name.
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Cause configuration could not be loaded.
    #[error("Cause configuration error: {0}")]
    CauseConfig(#[from] causes::CauseConfigError),

    /// A report with this id already exists.
    #[error("Report {id} already exists")]
    DuplicateId {
        /// The conflicting id.
        id: Uuid,
    },

    /// No `cause_table` row configures this cause.
    #[error("No configuration for cause {cause}")]
    UnknownCause {
        /// The unconfigured cause.
        cause: Cause,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Runs all pending database migrations.
///
/// Applied migrations are recorded by file name in the `_migrations` table,
/// so running this against an up-to-date database is a no-op.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let mut files: Vec<&File<'_>> = MIGRATIONS_DIR
        .files()
        .filter(|f| f.path().extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));

    let mut applied = 0usize;

    for file in files {
        let name = file.path().display().to_string();

        let already_applied: i64 = conn.query_row(
            "SELECT COUNT(*) FROM _migrations WHERE name = ?",
            duckdb::params![name],
            |row| row.get(0),
        )?;
        if already_applied > 0 {
            continue;
        }

        let sql = file.contents_utf8().ok_or_else(|| DbError::Migration {
            name: name.clone(),
            message: "file is not valid UTF-8".to_string(),
        })?;

        conn.execute_batch(sql).map_err(|e| DbError::Migration {
            name: name.clone(),
            message: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO _migrations (name) VALUES (?)",
            duckdb::params![name],
        )?;

        log::info!("Applied migration {name}");
        applied += 1;
    }

    log::info!("Database migrations completed successfully ({applied} applied)");
    Ok(())
}
