//! # Activity Dashboard
//!
//! Client-side filtering and synchronization core for a personal activity
//! dashboard: a multi-dimensional record index with incremental aggregates,
//! time bucketing, coordinated filter propagation across rendering surfaces,
//! heat-map derivation, and last-write-wins data refresh.
//!
//! ## Features
//!
//! - **`http`** - Enable the backend HTTP client and status poller
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_dashboard::{ActivityRecord, DashboardEngine, DateRange};
//! use chrono::{NaiveDate, TimeZone, Utc};
//!
//! let today = NaiveDate::from_ymd_opt(2021, 3, 31).unwrap();
//! let range = DateRange::last_days(90, today);
//! let mut engine = DashboardEngine::new(range).unwrap();
//!
//! // A fetch completed; apply it if no newer refresh started meanwhile
//! let token = engine.begin_refresh();
//! let records = vec![ActivityRecord {
//!     date: Utc.with_ymd_and_hms(2021, 3, 14, 9, 30, 0).unwrap(),
//!     activity_type: "Ride".to_string(),
//!     distance: 42.5,
//!     latitude_median: 51.5,
//!     longitude_median: -0.12,
//!     gpx: vec![[51.5, -0.12]],
//! }];
//! engine.complete_refresh(token, records, range).unwrap();
//!
//! assert_eq!(engine.total_distance().unwrap(), 42.5);
//! ```

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{DashboardError, Result};

// Multi-dimensional record index with incremental group aggregates
pub mod store;
pub use store::{
    AllGroupId, DimKey, DimensionId, Filter, GroupId, KeyFn, Reducer, RecordStore, MAX_DIMENSIONS,
};

// Time bucketing (day/week/month) for the volume chart
pub mod interval;
pub use interval::{IntervalSelector, IntervalUnit, MAX_DAY_TICKS};

// Filter propagation between rendering surfaces
pub mod coordinator;
pub use coordinator::{axis_domain, AxisDomain, FilterCoordinator, RenderSink};

// Heat-map center and point derivation
pub mod heatmap;
pub use heatmap::{median, HeatmapData};

// Last-write-wins refresh bookkeeping
pub mod refresh;
pub use refresh::{DataRefresher, RefreshToken};

// Selected-user session state
pub mod session;
pub use session::{UserSession, USER_SESSION_DAYS};

// Stateful dashboard engine tying the pieces together
pub mod engine;
pub use engine::DashboardEngine;

// HTTP client for the activity backend
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::ActivityClient;

// Background-job status polling
#[cfg(feature = "http")]
pub mod status;
#[cfg(feature = "http")]
pub use status::{parse_status, JobStatus, StatusPoller};

// ============================================================================
// Core types
// ============================================================================

/// One activity as served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Start time in UTC
    pub date: DateTime<Utc>,
    /// Activity type name ("Ride", "Run", ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Distance in kilometers
    pub distance: f64,
    /// Median latitude of the recorded track
    pub latitude_median: f64,
    /// Median longitude of the recorded track
    pub longitude_median: f64,
    /// `[lat, lon]` track points; may be empty for activities without GPS
    #[serde(default)]
    pub gpx: Vec<[f64; 2]>,
}

/// Inclusive date range requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days`-long window ending today (today inclusive).
    pub fn last_days(days: u64, today: NaiveDate) -> Self {
        let start = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(today);
        Self { start, end: today }
    }

    /// Midnight UTC at the start date.
    pub fn start_bound(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Midnight UTC at the end date.
    pub fn end_bound(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_activity_record_wire_format() {
        let json = r#"{
            "date": "2021-03-14T09:30:00Z",
            "type": "Ride",
            "distance": 42.5,
            "latitude_median": 51.5074,
            "longitude_median": -0.1278,
            "gpx": [[51.5074, -0.1278], [51.508, -0.129]]
        }"#;

        let record: ActivityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.date,
            Utc.with_ymd_and_hms(2021, 3, 14, 9, 30, 0).unwrap()
        );
        assert_eq!(record.activity_type, "Ride");
        assert_eq!(record.distance, 42.5);
        assert_eq!(record.gpx.len(), 2);
    }

    #[test]
    fn test_activity_record_gpx_defaults_to_empty() {
        let json = r#"{
            "date": "2021-03-14T09:30:00Z",
            "type": "Run",
            "distance": 10.0,
            "latitude_median": 51.5,
            "longitude_median": -0.1
        }"#;

        let record: ActivityRecord = serde_json::from_str(json).unwrap();
        assert!(record.gpx.is_empty());
    }

    #[test]
    fn test_date_range_last_days() {
        let today = NaiveDate::from_ymd_opt(2021, 3, 31).unwrap();
        let range = DateRange::last_days(90, today);

        assert_eq!(range.end, today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    }

    #[test]
    fn test_date_range_bounds_at_midnight() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
        );

        assert_eq!(
            range.start_bound(),
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            range.end_bound(),
            Utc.with_ymd_and_hms(2021, 3, 31, 0, 0, 0).unwrap()
        );
    }
}
