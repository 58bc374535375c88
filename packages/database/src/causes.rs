//! Per-cause merge radius and decay budget configuration.
//!
//! The defaults live in `causes.toml`, baked into the binary at compile
//! time via [`include_str!`]. An external TOML file with the same layout can
//! replace them at startup. Either way the entries are upserted into
//! `cause_table`, which is what the store reads when merging reports.

use std::collections::BTreeSet;
use std::path::Path;

use duckdb::Connection;
use serde::Deserialize;
use traffic_reporter_database_models::CauseConfigRow;
use traffic_reporter_report_models::Cause;

use crate::DbError;

/// Default cause configuration embedded at compile time.
const DEFAULT_CAUSES_TOML: &str = include_str!("../causes.toml");

/// Errors raised while loading cause configuration.
#[derive(Debug, thiserror::Error)]
pub enum CauseConfigError {
    /// The TOML could not be parsed.
    #[error("Failed to parse cause config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The override file could not be read.
    #[error("Failed to read cause config {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A cause appears more than once.
    #[error("Cause {0} is configured more than once")]
    Duplicate(Cause),

    /// A radius is not a positive finite number.
    #[error("Cause {cause} has invalid range {range_meters}")]
    InvalidRange {
        /// Offending cause.
        cause: Cause,
        /// Rejected radius.
        range_meters: f64,
    },

    /// A decay budget is not positive.
    #[error("Cause {cause} has invalid time_remaining {time_remaining}")]
    InvalidTimeRemaining {
        /// Offending cause.
        cause: Cause,
        /// Rejected budget.
        time_remaining: i32,
    },
}

#[derive(Debug, Deserialize)]
struct CauseConfigFile {
    #[serde(rename = "cause", default)]
    causes: Vec<CauseConfigEntry>,
}

#[derive(Debug, Deserialize)]
struct CauseConfigEntry {
    cause: Cause,
    name: Option<String>,
    range_meters: f64,
    time_remaining: i32,
}

/// Parses and validates a cause configuration TOML document.
///
/// Entries without a `name` use the cause's display name.
///
/// # Errors
///
/// Returns [`CauseConfigError`] if the document is malformed, a cause is
/// listed twice, or a value is out of range.
pub fn parse_cause_config(toml_str: &str) -> Result<Vec<CauseConfigRow>, CauseConfigError> {
    let file: CauseConfigFile = toml::from_str(toml_str)?;
    let mut seen = BTreeSet::new();

    file.causes
        .into_iter()
        .map(|entry| {
            if !seen.insert(entry.cause) {
                return Err(CauseConfigError::Duplicate(entry.cause));
            }
            if !entry.range_meters.is_finite() || entry.range_meters <= 0.0 {
                return Err(CauseConfigError::InvalidRange {
                    cause: entry.cause,
                    range_meters: entry.range_meters,
                });
            }
            if entry.time_remaining <= 0 {
                return Err(CauseConfigError::InvalidTimeRemaining {
                    cause: entry.cause,
                    time_remaining: entry.time_remaining,
                });
            }

            Ok(CauseConfigRow {
                cause: entry.cause,
                name: entry.name.unwrap_or_else(|| entry.cause.to_string()),
                range_meters: entry.range_meters,
                time_remaining: entry.time_remaining,
            })
        })
        .collect()
}

/// Returns the embedded default cause configuration.
///
/// # Errors
///
/// Returns [`CauseConfigError`] if the embedded TOML is invalid.
pub fn default_cause_config() -> Result<Vec<CauseConfigRow>, CauseConfigError> {
    parse_cause_config(DEFAULT_CAUSES_TOML)
}

/// Loads cause configuration from `path`, or the embedded defaults when
/// `path` is `None`.
///
/// # Errors
///
/// Returns [`CauseConfigError`] if the file cannot be read or is invalid.
pub fn load_cause_config(path: Option<&Path>) -> Result<Vec<CauseConfigRow>, CauseConfigError> {
    let Some(path) = path else {
        return default_cause_config();
    };

    let contents = std::fs::read_to_string(path).map_err(|source| CauseConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    log::info!("Loading cause configuration from {}", path.display());
    parse_cause_config(&contents)
}

/// Upserts the given configuration rows into `cause_table`.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails.
pub fn sync_cause_config(conn: &Connection, rows: &[CauseConfigRow]) -> Result<u64, DbError> {
    let mut stmt = conn.prepare(
        "INSERT INTO cause_table (id, name, cause_range, time_remaining)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             name = EXCLUDED.name,
             cause_range = EXCLUDED.cause_range,
             time_remaining = EXCLUDED.time_remaining",
    )?;

    let mut written = 0u64;
    for row in rows {
        written += stmt.execute(duckdb::params![
            row.cause.value(),
            row.name,
            row.range_meters,
            row.time_remaining,
        ])? as u64;
    }

    log::info!("Synced {written} cause configuration rows");
    Ok(written)
}

/// Looks up the configuration row for `cause`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row is malformed.
pub fn get_cause_config(conn: &Connection, cause: Cause) -> Result<Option<CauseConfigRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, cause_range, time_remaining FROM cause_table WHERE id = ?",
    )?;
    let mut rows = stmt.query(duckdb::params![cause.value()])?;

    match rows.next()? {
        Some(row) => Ok(Some(cause_config_from_row(row)?)),
        None => Ok(None),
    }
}

/// Lists every configured cause, ordered by cause value.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row is malformed.
pub fn get_all_cause_configs(conn: &Connection) -> Result<Vec<CauseConfigRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, cause_range, time_remaining FROM cause_table ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;

    let mut configs = Vec::new();
    while let Some(row) = rows.next()? {
        configs.push(cause_config_from_row(row)?);
    }

    Ok(configs)
}

fn cause_config_from_row(row: &duckdb::Row<'_>) -> Result<CauseConfigRow, DbError> {
    let id: i32 = row.get(0)?;
    let cause = Cause::from_value(id).map_err(|e| DbError::Conversion {
        message: format!("cause_table row: {e}"),
    })?;

    Ok(CauseConfigRow {
        cause,
        name: row.get(1)?,
        range_meters: row.get(2)?,
        time_remaining: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_covers_every_cause() {
        let rows = default_cause_config().unwrap();
        for cause in Cause::all() {
            assert!(
                rows.iter().any(|r| r.cause == *cause),
                "{cause:?} missing from causes.toml"
            );
        }
    }

    #[test]
    fn accident_range_is_fifty_meters() {
        let rows = default_cause_config().unwrap();
        let accident = rows.iter().find(|r| r.cause == Cause::Accident).unwrap();
        assert!((accident.range_meters - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_name_falls_back_to_cause() {
        let rows = parse_cause_config(
            r#"
            [[cause]]
            cause = "POLICE"
            range_meters = 10.0
            time_remaining = 5
            "#,
        )
        .unwrap();
        assert_eq!(rows[0].name, "POLICE");
    }

    #[test]
    fn rejects_duplicates_and_bad_values() {
        let duplicate = r#"
            [[cause]]
            cause = "HAZARD"
            range_meters = 10.0
            time_remaining = 5

            [[cause]]
            cause = "HAZARD"
            range_meters = 20.0
            time_remaining = 5
        "#;
        assert!(matches!(
            parse_cause_config(duplicate),
            Err(CauseConfigError::Duplicate(Cause::Hazard))
        ));

        let zero_range = r#"
            [[cause]]
            cause = "HAZARD"
            range_meters = 0.0
            time_remaining = 5
        "#;
        assert!(matches!(
            parse_cause_config(zero_range),
            Err(CauseConfigError::InvalidRange { .. })
        ));

        let zero_budget = r#"
            [[cause]]
            cause = "HAZARD"
            range_meters = 5.0
            time_remaining = 0
        "#;
        assert!(matches!(
            parse_cause_config(zero_budget),
            Err(CauseConfigError::InvalidTimeRemaining { .. })
        ));

        assert!(matches!(
            parse_cause_config("[[cause]]\ncause = \"SINKHOLE\"\nrange_meters = 1.0\ntime_remaining = 1"),
            Err(CauseConfigError::Parse(_))
        ));
    }

    #[test]
    fn sync_upserts_rows() {
        let conn = crate::db::open_in_memory().unwrap();
        let rows = default_cause_config().unwrap();

        sync_cause_config(&conn, &rows).unwrap();
        let mut changed = rows.clone();
        changed[0].range_meters = 75.0;
        sync_cause_config(&conn, &changed).unwrap();

        let stored = get_all_cause_configs(&conn).unwrap();
        assert_eq!(stored.len(), rows.len());

        let first = get_cause_config(&conn, changed[0].cause).unwrap().unwrap();
        assert!((first.range_meters - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unconfigured_cause_is_none() {
        let conn = crate::db::open_in_memory().unwrap();
        assert!(get_cause_config(&conn, Cause::Closure).unwrap().is_none());
    }
}
