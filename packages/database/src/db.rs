//! Database connection utilities.

use std::path::{Path, PathBuf};

use duckdb::Connection;

use crate::{DbError, run_migrations};

/// Value of `DATABASE_PATH` that selects a throwaway in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Opens (or creates) the report `DuckDB` at `path` and applies pending
/// migrations.
///
/// # Errors
///
/// Returns [`DbError`] if the directory cannot be created, the connection
/// fails, or a migration fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("SET threads = 4;")?;
    run_migrations(&conn)?;

    Ok(conn)
}

/// Opens a migrated in-memory database.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or a migration fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Returns the database location from the `DATABASE_PATH` environment
/// variable, or the default path under `data/`.
#[must_use]
pub fn path_from_env() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map_or_else(|_| crate::paths::reports_db_path(), PathBuf::from)
}

/// Opens the database named by `DATABASE_PATH`.
///
/// `:memory:` selects an in-memory database.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or a migration fails.
pub fn open_from_env() -> Result<Connection, DbError> {
    let path = path_from_env();

    if path.as_os_str() == IN_MEMORY {
        log::warn!("DATABASE_PATH is {IN_MEMORY}; reports will not survive a restart");
        return open_in_memory();
    }

    log::info!("Opening report database at {}", path.display());
    open(&path)
}
