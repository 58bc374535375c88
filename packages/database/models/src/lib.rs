#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the report `DuckDB`. They are distinct from the API request/response
//! types in `traffic_reporter_server_models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use traffic_reporter_report_models::{Cause, Direction};
use uuid::Uuid;

/// A geographic bounding box in WGS84 coordinates.
///
/// `west`/`south` form the lower-left corner and `east`/`north` the
/// upper-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary (lower-left X).
    pub west: f64,
    /// Southern latitude boundary (lower-left Y).
    pub south: f64,
    /// Eastern longitude boundary (upper-right X).
    pub east: f64,
    /// Northern latitude boundary (upper-right Y).
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the point lies inside the box (bounds inclusive).
    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

/// Unvalidated map query parameters as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Visible map region.
    pub bbox: BoundingBox,
    /// Raw cause bitmask; `0` disables the cause filter.
    pub cause_mask: u32,
    /// 1-based page number.
    pub page_number: u32,
    /// Maximum number of reports per page.
    pub page_size: u32,
}

/// A report ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    /// Identifier assigned by the caller before insertion.
    pub id: Uuid,
    /// Incident cause.
    pub cause: Cause,
    /// Affected direction of travel.
    pub direction: Direction,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// When the report was submitted.
    pub date_created: DateTime<Utc>,
    /// Reporting user, if known.
    pub user_id: Option<String>,
}

/// A report row as retrieved from the `trafreport` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Primary key.
    pub id: Uuid,
    /// Incident cause.
    pub cause: Cause,
    /// Affected direction of travel.
    pub direction: Direction,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// When the report was first submitted.
    pub date_created: DateTime<Utc>,
    /// Remaining decay budget in minutes.
    pub time_remaining: i32,
    /// Number of merged confirmations.
    pub rating: i32,
    /// Reporting user, if known.
    pub user_id: Option<String>,
}

/// A row in the `cause_table` lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseConfigRow {
    /// Cause this row configures.
    pub cause: Cause,
    /// Human-readable name.
    pub name: String,
    /// Merge radius in meters.
    pub range_meters: f64,
    /// Decay budget in minutes granted on insert and on every merge.
    pub time_remaining: i32,
}

/// Result of submitting a report through the deduplication policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddOutcome {
    /// No nearby report of the same cause existed; a new row was inserted.
    Added(Uuid),
    /// The submission was merged into an existing report.
    Updated(Uuid),
}

impl AddOutcome {
    /// Identifier of the inserted or merged-into report.
    #[must_use]
    pub const fn id(self) -> Uuid {
        match self {
            Self::Added(id) | Self::Updated(id) => id,
        }
    }

    /// Whether the submission was merged into an existing report.
    #[must_use]
    pub const fn is_merge(self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_bounds_are_inclusive() {
        let bbox = BoundingBox::new(10.0, 20.0, 11.0, 21.0);
        assert!(bbox.contains(10.0, 20.0));
        assert!(bbox.contains(11.0, 21.0));
        assert!(bbox.contains(10.5, 20.5));
        assert!(!bbox.contains(9.999, 20.5));
        assert!(!bbox.contains(10.5, 21.001));
    }

    #[test]
    fn outcome_exposes_id() {
        let id = Uuid::new_v4();
        assert_eq!(AddOutcome::Added(id).id(), id);
        assert!(!AddOutcome::Added(id).is_merge());
        assert!(AddOutcome::Updated(id).is_merge());
    }
}
