//! Report store operations on the `trafreport` table.
//!
//! Timestamps cross the `DuckDB` boundary as epoch milliseconds; ids are
//! stored as hyphenated UUID text.

use chrono::{DateTime, Utc};
use duckdb::Connection;
use traffic_reporter_database_models::{NewReport, ReportRow};
use traffic_reporter_report_models::{Cause, Direction};
use uuid::Uuid;

use crate::DbError;
use crate::filter::ReportQuery;

/// Column list shared by every report `SELECT`, in [`report_from_row`] order.
pub(crate) const REPORT_COLUMNS: &str = "id, cause, direction, longitude, latitude, \
     epoch_ms(date_created) AS date_created_ms, time_remaining, rating, user_id";

/// An existing report close enough to a submission to absorb it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyReport {
    /// Id of the existing report.
    pub id: Uuid,
    /// Distance from the submission in meters.
    pub distance_meters: f64,
}

/// Inserts a new report with `rating = 0` and the decay budget configured
/// for its cause.
///
/// # Errors
///
/// Returns [`DbError::DuplicateId`] if the id is taken,
/// [`DbError::UnknownCause`] if the cause has no `cause_table` row, or
/// [`DbError::Database`] if the write fails.
pub fn insert_report(conn: &Connection, report: &NewReport) -> Result<(), DbError> {
    if report_exists(conn, report.id)? {
        return Err(DbError::DuplicateId { id: report.id });
    }

    let inserted = conn.execute(
        "INSERT INTO trafreport (
            id, cause, direction, longitude, latitude,
            date_created, time_remaining, rating, user_id
        )
        SELECT ?, ?, ?, ?, ?, epoch_ms(CAST(? AS BIGINT)), c.time_remaining, 0, ?
        FROM cause_table c
        WHERE c.id = ?",
        duckdb::params![
            report.id.to_string(),
            report.cause.value(),
            report.direction.value(),
            report.longitude,
            report.latitude,
            report.date_created.timestamp_millis(),
            report.user_id.as_deref(),
            report.cause.value(),
        ],
    )?;

    if inserted == 0 {
        return Err(DbError::UnknownCause {
            cause: report.cause,
        });
    }

    Ok(())
}

/// Whether a report with `id` exists.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn report_exists(conn: &Connection, id: Uuid) -> Result<bool, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trafreport WHERE id = ?",
        duckdb::params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Fetches a single report by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored row is malformed.
pub fn get_report(conn: &Connection, id: Uuid) -> Result<Option<ReportRow>, DbError> {
    let sql = format!("SELECT {REPORT_COLUMNS} FROM trafreport WHERE id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params![id.to_string()])?;

    match rows.next()? {
        Some(row) => Ok(Some(report_from_row(row)?)),
        None => Ok(None),
    }
}

/// Returns the reports matching a validated map query.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row is malformed.
pub fn scan_reports(conn: &Connection, query: &ReportQuery) -> Result<Vec<ReportRow>, DbError> {
    let (sql, params) = query.to_sql();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(params))?;

    let mut reports = Vec::new();
    while let Some(row) = rows.next()? {
        reports.push(report_from_row(row)?);
    }

    Ok(reports)
}

/// Deletes a report, returning the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn delete_report(conn: &Connection, id: Uuid) -> Result<u64, DbError> {
    let deleted = conn.execute(
        "DELETE FROM trafreport WHERE id = ?",
        duckdb::params![id.to_string()],
    )?;
    Ok(deleted as u64)
}

/// Resets a report's decay budget to the value configured for `cause` and
/// increments its rating, in one statement.
///
/// If `cause` has no configuration the current budget is kept.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn refresh_time_and_rating(conn: &Connection, id: Uuid, cause: Cause) -> Result<u64, DbError> {
    let updated = conn.execute(
        "UPDATE trafreport SET
            time_remaining = COALESCE(
                (SELECT c.time_remaining FROM cause_table c WHERE c.id = ?),
                time_remaining
            ),
            rating = rating + 1
         WHERE id = ?",
        duckdb::params![cause.value(), id.to_string()],
    )?;
    Ok(updated as u64)
}

/// Finds the existing report of `cause` nearest to the given point, if it
/// lies strictly closer than `range_meters`.
///
/// Ties on distance go to the oldest report, then the lowest id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored id is malformed.
pub fn find_nearest_in_range(
    conn: &Connection,
    cause: Cause,
    longitude: f64,
    latitude: f64,
    range_meters: f64,
) -> Result<Option<NearbyReport>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM (
            SELECT id, date_created,
                   calculate_distance(
                       CAST(? AS DOUBLE), CAST(? AS DOUBLE), longitude, latitude
                   ) AS distance
            FROM trafreport
            WHERE cause = ?
         )
         WHERE distance < ?
         ORDER BY distance ASC, date_created ASC, id ASC
         LIMIT 1",
    )?;
    let mut rows = stmt.query(duckdb::params![
        longitude,
        latitude,
        cause.value(),
        range_meters,
    ])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let id: String = row.get(0)?;
    Ok(Some(NearbyReport {
        id: parse_id(&id)?,
        distance_meters: row.get(1)?,
    }))
}

fn parse_id(id: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(id).map_err(|e| DbError::Conversion {
        message: format!("Invalid report id {id:?}: {e}"),
    })
}

fn report_from_row(row: &duckdb::Row<'_>) -> Result<ReportRow, DbError> {
    let id: String = row.get(0)?;
    let cause_value: i32 = row.get(1)?;
    let cause = Cause::from_value(cause_value).map_err(|e| DbError::Conversion {
        message: format!("Report {id}: {e}"),
    })?;

    let date_created_ms: i64 = row.get(5)?;
    let date_created =
        DateTime::<Utc>::from_timestamp_millis(date_created_ms).ok_or_else(|| {
            DbError::Conversion {
                message: format!("Report {id}: timestamp {date_created_ms} out of range"),
            }
        })?;

    Ok(ReportRow {
        id: parse_id(&id)?,
        cause,
        direction: Direction::from_value(row.get(2)?),
        longitude: row.get(3)?,
        latitude: row.get(4)?,
        date_created,
        time_remaining: row.get(6)?,
        rating: row.get(7)?,
        user_id: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causes::{default_cause_config, sync_cause_config};
    use traffic_reporter_database_models::{BoundingBox, ReportFilter};
    use traffic_reporter_report_models::CauseMask;

    fn setup() -> Connection {
        let conn = crate::db::open_in_memory().unwrap();
        sync_cause_config(&conn, &default_cause_config().unwrap()).unwrap();
        conn
    }

    fn report(cause: Cause, longitude: f64, latitude: f64) -> NewReport {
        NewReport {
            id: Uuid::new_v4(),
            cause,
            direction: Direction::North,
            longitude,
            latitude,
            date_created: Utc::now(),
            user_id: Some("user-1".to_string()),
        }
    }

    fn scan(conn: &Connection, bbox: BoundingBox, cause_mask: u32) -> Vec<ReportRow> {
        let query = ReportQuery::from_filter(&ReportFilter {
            bbox,
            cause_mask,
            page_number: 1,
            page_size: 100,
        })
        .unwrap();
        scan_reports(conn, &query).unwrap()
    }

    #[test]
    fn insert_then_get() {
        let conn = setup();
        let new = report(Cause::Hazard, 15.97, 45.81);
        insert_report(&conn, &new).unwrap();

        let row = get_report(&conn, new.id).unwrap().unwrap();
        assert_eq!(row.id, new.id);
        assert_eq!(row.cause, Cause::Hazard);
        assert_eq!(row.direction, Direction::North);
        assert_eq!(row.rating, 0);
        assert_eq!(row.time_remaining, 45);
        assert_eq!(row.user_id.as_deref(), Some("user-1"));
        assert_eq!(
            row.date_created.timestamp_millis(),
            new.date_created.timestamp_millis()
        );
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let conn = setup();
        let new = report(Cause::Hazard, 15.97, 45.81);
        insert_report(&conn, &new).unwrap();

        assert!(matches!(
            insert_report(&conn, &new),
            Err(DbError::DuplicateId { id }) if id == new.id
        ));
    }

    #[test]
    fn insert_requires_cause_config() {
        let conn = crate::db::open_in_memory().unwrap();
        let new = report(Cause::Police, 0.0, 0.0);

        assert!(matches!(
            insert_report(&conn, &new),
            Err(DbError::UnknownCause {
                cause: Cause::Police
            })
        ));
        assert!(get_report(&conn, new.id).unwrap().is_none());
    }

    #[test]
    fn get_unknown_is_none() {
        let conn = setup();
        assert!(get_report(&conn, Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn delete_reports_rows_affected() {
        let conn = setup();
        let new = report(Cause::Accident, 1.0, 1.0);
        insert_report(&conn, &new).unwrap();

        assert_eq!(delete_report(&conn, new.id).unwrap(), 1);
        assert_eq!(delete_report(&conn, new.id).unwrap(), 0);
        assert!(get_report(&conn, new.id).unwrap().is_none());
    }

    #[test]
    fn refresh_increments_rating_and_resets_budget() {
        let conn = setup();
        let new = report(Cause::Congestion, 1.0, 1.0);
        insert_report(&conn, &new).unwrap();
        conn.execute(
            "UPDATE trafreport SET time_remaining = 1 WHERE id = ?",
            duckdb::params![new.id.to_string()],
        )
        .unwrap();

        assert_eq!(refresh_time_and_rating(&conn, new.id, Cause::Congestion).unwrap(), 1);

        let row = get_report(&conn, new.id).unwrap().unwrap();
        assert_eq!(row.rating, 1);
        assert_eq!(row.time_remaining, 30);
    }

    #[test]
    fn refresh_unknown_id_affects_nothing() {
        let conn = setup();
        assert_eq!(
            refresh_time_and_rating(&conn, Uuid::new_v4(), Cause::Accident).unwrap(),
            0
        );
    }

    #[test]
    fn nearest_in_range_picks_closest_same_cause() {
        let conn = setup();
        let far = report(Cause::Accident, 10.0003, 20.0);
        let near = report(Cause::Accident, 10.0001, 20.0);
        let other_cause = report(Cause::Police, 10.0, 20.0);
        for r in [&far, &near, &other_cause] {
            insert_report(&conn, r).unwrap();
        }

        let found = find_nearest_in_range(&conn, Cause::Accident, 10.0, 20.0, 50.0)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, near.id);
        assert!(found.distance_meters < 15.0, "got {}", found.distance_meters);

        assert!(
            find_nearest_in_range(&conn, Cause::Hazard, 10.0, 20.0, 50.0)
                .unwrap()
                .is_none()
        );
        assert!(
            find_nearest_in_range(&conn, Cause::Accident, 10.01, 20.0, 50.0)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn scan_stays_inside_bbox() {
        let conn = setup();
        let inside = report(Cause::Accident, 10.5, 20.5);
        let edge = report(Cause::Hazard, 11.0, 21.0);
        let outside_x = report(Cause::Accident, 11.5, 20.5);
        let outside_y = report(Cause::Accident, 10.5, 19.5);
        for r in [&inside, &edge, &outside_x, &outside_y] {
            insert_report(&conn, r).unwrap();
        }

        let bbox = BoundingBox::new(10.0, 20.0, 11.0, 21.0);
        let rows = scan(&conn, bbox, 0);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| bbox.contains(r.longitude, r.latitude)));
    }

    #[test]
    fn scan_applies_cause_mask() {
        let conn = setup();
        for cause in [Cause::Accident, Cause::Police, Cause::Hazard] {
            insert_report(&conn, &report(cause, 0.5, 0.5)).unwrap();
        }
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);

        assert_eq!(scan(&conn, bbox, 0).len(), 3);

        let mask: CauseMask = [Cause::Accident, Cause::Hazard].into_iter().collect();
        let rows = scan(&conn, bbox, mask.bits());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| mask.contains(r.cause)));

        assert!(scan(&conn, bbox, Cause::Closure.bit()).is_empty());
    }

    #[test]
    fn scan_pages_without_overlap() {
        let conn = setup();
        for i in 0..5 {
            let mut r = report(Cause::Hazard, 0.1 * f64::from(i), 0.5);
            r.date_created = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + i64::from(i))
                .unwrap();
            insert_report(&conn, &r).unwrap();
        }
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);

        let page = |page_number| {
            let query = ReportQuery::from_filter(&ReportFilter {
                bbox,
                cause_mask: 0,
                page_number,
                page_size: 2,
            })
            .unwrap();
            scan_reports(&conn, &query).unwrap()
        };

        let first = page(1);
        let second = page(2);
        let third = page(3);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(third.len(), 1);
        assert!(first[0].date_created > first[1].date_created);
        assert!(first[1].date_created > second[0].date_created);
        assert!(page(4).is_empty());
    }
}
