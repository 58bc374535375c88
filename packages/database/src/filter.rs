//! Map query validation and SQL construction.
//!
//! A [`ReportFilter`] arrives straight from the caller. [`ReportQuery`] is
//! the validated form: an ordered bounding box, a known cause mask, and
//! offset pagination. Every value ends up as a bound parameter; nothing is
//! formatted into the SQL text.

use duckdb::types::Value;
use traffic_reporter_database_models::{BoundingBox, ReportFilter};
use traffic_reporter_report_models::{CauseMask, InvalidCauseMaskError};

use crate::reports::REPORT_COLUMNS;

/// Upper bound applied to `page_size`.
pub const MAX_PAGE_SIZE: u32 = 1_000;

/// Reasons a [`ReportFilter`] is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// A coordinate is NaN or infinite.
    #[error("Bounding box coordinates must be finite")]
    NonFiniteCoordinate,

    /// Lower-left X is east of upper-right X.
    #[error("Lower-left longitude {west} is greater than upper-right longitude {east}")]
    InvertedLongitude {
        /// Lower-left X.
        west: f64,
        /// Upper-right X.
        east: f64,
    },

    /// Lower-left Y is north of upper-right Y.
    #[error("Lower-left latitude {south} is greater than upper-right latitude {north}")]
    InvertedLatitude {
        /// Lower-left Y.
        south: f64,
        /// Upper-right Y.
        north: f64,
    },

    /// `page_size` is zero.
    #[error("Page size must be positive")]
    ZeroPageSize,

    /// `page_number` is zero.
    #[error("Page number starts at 1")]
    ZeroPageNumber,

    /// The cause mask contains unknown bits.
    #[error(transparent)]
    CauseMask(#[from] InvalidCauseMaskError),
}

/// A validated map query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportQuery {
    /// Region to search, bounds inclusive.
    pub bbox: BoundingBox,
    /// Causes to include; empty means all.
    pub causes: CauseMask,
    /// Maximum rows returned.
    pub limit: u32,
    /// Rows skipped before the first returned row.
    pub offset: u64,
}

impl ReportQuery {
    /// Validates `filter` and converts it into a query.
    ///
    /// `page_size` is clamped to [`MAX_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for non-finite or inverted coordinates, a zero
    /// page size or page number, or unknown cause bits.
    pub fn from_filter(filter: &ReportFilter) -> Result<Self, FilterError> {
        let bbox = filter.bbox;

        if ![bbox.west, bbox.south, bbox.east, bbox.north]
            .iter()
            .all(|c| c.is_finite())
        {
            return Err(FilterError::NonFiniteCoordinate);
        }
        if bbox.west > bbox.east {
            return Err(FilterError::InvertedLongitude {
                west: bbox.west,
                east: bbox.east,
            });
        }
        if bbox.south > bbox.north {
            return Err(FilterError::InvertedLatitude {
                south: bbox.south,
                north: bbox.north,
            });
        }
        if filter.page_size == 0 {
            return Err(FilterError::ZeroPageSize);
        }
        if filter.page_number == 0 {
            return Err(FilterError::ZeroPageNumber);
        }

        let causes = CauseMask::from_bits(filter.cause_mask)?;
        let limit = filter.page_size.min(MAX_PAGE_SIZE);
        let offset = u64::from(filter.page_number - 1) * u64::from(limit);

        Ok(Self {
            bbox,
            causes,
            limit,
            offset,
        })
    }

    /// Builds the `SELECT` statement and its positional parameters.
    #[must_use]
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = format!(
            "SELECT {REPORT_COLUMNS}
             FROM trafreport
             WHERE longitude BETWEEN ? AND ?
               AND latitude BETWEEN ? AND ?"
        );
        let mut params = vec![
            Value::Double(self.bbox.west),
            Value::Double(self.bbox.east),
            Value::Double(self.bbox.south),
            Value::Double(self.bbox.north),
        ];

        if !self.causes.is_empty() {
            sql.push_str(" AND (cause & CAST(? AS INTEGER)) <> 0");
            params.push(Value::BigInt(i64::from(self.causes.bits())));
        }

        sql.push_str(" ORDER BY date_created DESC, id ASC LIMIT ? OFFSET ?");
        params.push(Value::BigInt(i64::from(self.limit)));
        params.push(Value::BigInt(
            i64::try_from(self.offset).unwrap_or(i64::MAX),
        ));

        (sql, params)
    }
}
