#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Report service for traffic reporter.
//!
//! [`ReportService`] is the boundary the HTTP layer calls into. It assigns
//! ids and timestamps to submissions, validates map queries before they
//! reach the store, and runs every store call on the blocking thread pool.
//!
//! `duckdb::Connection` is `Send` but not `Sync`, so the service owns a
//! single connection behind a `Mutex`. Holding that lock for the whole
//! merge-or-insert transaction is what keeps two simultaneous submissions
//! for the same spot from both inserting.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use traffic_reporter_database::filter::{FilterError, ReportQuery};
use traffic_reporter_database::{DbError, causes, db, dedup, reports};
use traffic_reporter_database_models::{
    AddOutcome, CauseConfigRow, NewReport, ReportFilter, ReportRow,
};
use traffic_reporter_report_models::{Cause, Direction};
use uuid::Uuid;

/// Errors returned by [`ReportService`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The store rejected or failed the operation.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The map query was malformed; the store was not touched.
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// The submission's coordinates are not a valid WGS84 position.
    #[error("Invalid coordinates ({longitude}, {latitude})")]
    InvalidCoordinates {
        /// Submitted longitude.
        longitude: f64,
        /// Submitted latitude.
        latitude: f64,
    },

    /// The blocking store task panicked or was cancelled.
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A report as submitted by a user, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    /// Incident cause.
    pub cause: Cause,
    /// Affected direction of travel.
    pub direction: Direction,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Reporting user, if known.
    pub user_id: Option<String>,
}

impl ReportSubmission {
    fn validate(&self) -> Result<(), ServiceError> {
        let valid = self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude);

        if valid {
            Ok(())
        } else {
            Err(ServiceError::InvalidCoordinates {
                longitude: self.longitude,
                latitude: self.latitude,
            })
        }
    }

    fn into_new_report(self) -> NewReport {
        NewReport {
            id: Uuid::new_v4(),
            cause: self.cause,
            direction: self.direction,
            longitude: self.longitude,
            latitude: self.latitude,
            date_created: Utc::now(),
            user_id: self.user_id,
        }
    }
}

/// Orchestrates deduplication, filtering, and storage of reports.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct ReportService {
    conn: Arc<Mutex<Connection>>,
}

impl ReportService {
    /// Wraps a migrated connection and writes `cause_config` into
    /// `cause_table`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Database`] if the cause rows cannot be written.
    pub fn new(conn: Connection, cause_config: &[CauseConfigRow]) -> Result<Self, ServiceError> {
        causes::sync_cause_config(&conn, cause_config)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates a service over a fresh in-memory database with the default
    /// cause configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Database`] if the database cannot be created.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        let conn = db::open_in_memory()?;
        let cause_config = causes::default_cause_config().map_err(DbError::from)?;
        Self::new(conn, &cause_config)
    }

    /// Runs `f` against the connection on the blocking thread pool.
    ///
    /// The closure runs to completion even if the returned future is
    /// dropped, so a transaction started inside it always commits or rolls
    /// back.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            // A panic mid-transaction drops the transaction, which rolls it
            // back, so the connection is still consistent.
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard).map_err(ServiceError::from)
        })
        .await?
    }

    /// Submits a report, merging it into a nearby report of the same cause
    /// when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCoordinates`] for an impossible
    /// position, or [`ServiceError::Database`] if the cause is not
    /// configured or the store fails.
    pub async fn add_report(&self, submission: ReportSubmission) -> Result<AddOutcome, ServiceError> {
        submission.validate()?;
        let report = submission.into_new_report();

        let outcome = self
            .with_connection(move |conn| dedup::add_or_merge_report(conn, &report))
            .await?;

        log::info!("Report submission: {outcome:?}");
        Ok(outcome)
    }

    /// Fetches a report by id; `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Database`] if the store fails.
    pub async fn get_report(&self, id: Uuid) -> Result<Option<ReportRow>, ServiceError> {
        self.with_connection(move |conn| reports::get_report(conn, id))
            .await
    }

    /// Deletes a report, returning the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Database`] if the store fails.
    pub async fn remove_report(&self, id: Uuid) -> Result<u64, ServiceError> {
        let removed = self
            .with_connection(move |conn| reports::delete_report(conn, id))
            .await?;

        log::info!("Removed report {id} ({removed} rows)");
        Ok(removed)
    }

    /// Lists reports inside a bounding box, optionally restricted to a set
    /// of causes.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidFilter`] before touching the store if
    /// the filter is malformed, or [`ServiceError::Database`] if the store
    /// fails.
    pub async fn list_filtered(&self, filter: ReportFilter) -> Result<Vec<ReportRow>, ServiceError> {
        let query = ReportQuery::from_filter(&filter)?;
        self.with_connection(move |conn| reports::scan_reports(conn, &query))
            .await
    }

    /// Lists the configured causes with their merge radius and decay
    /// budget.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Database`] if the store fails.
    pub async fn list_causes(&self) -> Result<Vec<CauseConfigRow>, ServiceError> {
        self.with_connection(|conn| causes::get_all_cause_configs(conn))
            .await
    }
}
