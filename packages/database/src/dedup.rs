//! Merge-or-insert policy for new submissions.
//!
//! A submission is merged into the nearest existing report of the same
//! cause that lies within the cause's configured radius; otherwise it becomes
//! a new row. The lookup and the write share one transaction so a failure
//! leaves nothing half-applied. Callers must hold the only write handle to
//! the connection for the duration of the call, which is what serializes
//! concurrent submissions for the same spot.

use duckdb::Connection;
use traffic_reporter_database_models::{AddOutcome, NewReport};

use crate::{DbError, causes, reports};

/// Adds `report`, or merges it into an existing nearby report of the same
/// cause.
///
/// # Errors
///
/// Returns [`DbError::UnknownCause`] if the cause is not configured, or any
/// store error. On error the transaction is rolled back.
pub fn add_or_merge_report(conn: &mut Connection, report: &NewReport) -> Result<AddOutcome, DbError> {
    let tx = conn.transaction()?;

    let config = causes::get_cause_config(&tx, report.cause)?.ok_or(DbError::UnknownCause {
        cause: report.cause,
    })?;

    let nearby = reports::find_nearest_in_range(
        &tx,
        report.cause,
        report.longitude,
        report.latitude,
        config.range_meters,
    )?;

    let outcome = if let Some(existing) = nearby {
        let updated = reports::refresh_time_and_rating(&tx, existing.id, report.cause)?;
        if updated != 1 {
            return Err(DbError::Conversion {
                message: format!("Merge into {} updated {updated} rows", existing.id),
            });
        }

        log::debug!(
            "Merged {} report at ({}, {}) into {} ({:.1}m away, range {}m)",
            report.cause,
            report.longitude,
            report.latitude,
            existing.id,
            existing.distance_meters,
            config.range_meters,
        );
        AddOutcome::Updated(existing.id)
    } else {
        reports::insert_report(&tx, report)?;
        log::debug!(
            "Added {} report {} at ({}, {})",
            report.cause,
            report.id,
            report.longitude,
            report.latitude,
        );
        AddOutcome::Added(report.id)
    };

    tx.commit()?;
    Ok(outcome)
}
