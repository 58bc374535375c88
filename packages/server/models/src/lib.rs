#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the traffic reporter server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use traffic_reporter_database_models::{
    AddOutcome, BoundingBox, CauseConfigRow, ReportFilter, ReportRow,
};
use traffic_reporter_report_models::{Cause, Direction};
use uuid::Uuid;

/// Page size used when the client does not send one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A traffic report as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Unique report ID.
    pub id: Uuid,
    /// Incident cause.
    pub cause: Cause,
    /// Cause bit value.
    pub cause_value: i32,
    /// Affected direction of travel.
    pub direction: Direction,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
    /// When the report was first submitted (ISO 8601).
    pub date_created: DateTime<Utc>,
    /// Remaining decay budget in minutes.
    pub time_remaining: i32,
    /// Number of merged confirmations.
    pub rating: i32,
    /// Reporting user, if known.
    pub user_id: Option<String>,
}

impl From<ReportRow> for ApiReport {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            cause: row.cause,
            cause_value: row.cause.value(),
            direction: row.direction,
            longitude: row.longitude,
            latitude: row.latitude,
            date_created: row.date_created,
            time_remaining: row.time_remaining,
            rating: row.rating,
            user_id: row.user_id,
        }
    }
}

/// Request body for submitting a report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewReport {
    /// Incident cause.
    pub cause: Cause,
    /// Affected direction of travel (defaults to both).
    #[serde(default)]
    pub direction: Direction,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
    /// Reporting user, if known.
    pub user_id: Option<String>,
}

/// Whether a submission created a report or confirmed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiAddOutcome {
    /// A new report was created.
    Added,
    /// An existing nearby report was confirmed.
    Updated,
}

/// Response body for a report submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAddResult {
    /// Id of the created or confirmed report.
    pub id: Uuid,
    /// What happened to the submission.
    pub outcome: ApiAddOutcome,
}

impl From<AddOutcome> for ApiAddResult {
    fn from(outcome: AddOutcome) -> Self {
        match outcome {
            AddOutcome::Added(id) => Self {
                id,
                outcome: ApiAddOutcome::Added,
            },
            AddOutcome::Updated(id) => Self {
                id,
                outcome: ApiAddOutcome::Updated,
            },
        }
    }
}

/// Response body for a report removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRemoveResult {
    /// Number of rows deleted (0 or 1).
    pub rows_affected: u64,
}

/// Query parameters for the filtered report listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQueryParams {
    /// Lower-left longitude.
    pub lower_left_x: f64,
    /// Lower-left latitude.
    pub lower_left_y: f64,
    /// Upper-right longitude.
    pub upper_right_x: f64,
    /// Upper-right latitude.
    pub upper_right_y: f64,
    /// Cause bitmask; omitted or `0` means all causes.
    pub cause: Option<u32>,
    /// 1-based page number (defaults to 1).
    pub page_number: Option<u32>,
    /// Page size (defaults to [`DEFAULT_PAGE_SIZE`]).
    pub page_size: Option<u32>,
}

impl From<&ReportQueryParams> for ReportFilter {
    fn from(params: &ReportQueryParams) -> Self {
        Self {
            bbox: BoundingBox::new(
                params.lower_left_x,
                params.lower_left_y,
                params.upper_right_x,
                params.upper_right_y,
            ),
            cause_mask: params.cause.unwrap_or(0),
            page_number: params.page_number.unwrap_or(1),
            page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

/// A configured cause as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCause {
    /// Cause identifier.
    pub cause: Cause,
    /// Cause bit value, usable in the `cause` filter mask.
    pub value: i32,
    /// Human-readable name.
    pub name: String,
    /// Merge radius in meters.
    pub range: f64,
    /// Decay budget in minutes.
    pub time_remaining: i32,
}

impl From<CauseConfigRow> for ApiCause {
    fn from(row: CauseConfigRow) -> Self {
        Self {
            cause: row.cause,
            value: row.cause.value(),
            name: row.name,
            range: row.range_meters,
            time_remaining: row.time_remaining,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_default_pagination() {
        let params: ReportQueryParams = serde_json::from_str(
            r#"{"lowerLeftX": 1.0, "lowerLeftY": 2.0, "upperRightX": 3.0, "upperRightY": 4.0}"#,
        )
        .unwrap();
        let filter = ReportFilter::from(&params);

        assert_eq!(filter.bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(filter.cause_mask, 0);
        assert_eq!(filter.page_number, 1);
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn new_report_direction_defaults_to_both() {
        let body: ApiNewReport =
            serde_json::from_str(r#"{"cause": "HAZARD", "longitude": 1.0, "latitude": 2.0}"#)
                .unwrap();
        assert_eq!(body.cause, Cause::Hazard);
        assert_eq!(body.direction, Direction::Both);
        assert!(body.user_id.is_none());
    }

    #[test]
    fn add_result_serializes_outcome() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ApiAddResult::from(AddOutcome::Updated(id))).unwrap();
        assert_eq!(json["outcome"], "UPDATED");
        assert_eq!(json["id"], id.to_string());
    }
}
