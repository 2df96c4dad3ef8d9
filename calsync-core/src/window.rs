//! Time window bounding one sync cycle.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalSyncError, CalSyncResult};

/// Half-open range `[start, end)` of instants considered during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CalSyncResult<Self> {
        if start >= end {
            return Err(CalSyncError::InvalidWindow(format!(
                "start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(SyncWindow { start, end })
    }

    /// Parse CLI-style bounds.
    /// - `from`: YYYY-MM-DD, defaults to today minus `past_days`
    /// - `to`: YYYY-MM-DD (inclusive day), defaults to today plus `future_days`
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        past_days: i64,
        future_days: i64,
    ) -> CalSyncResult<Self> {
        let today = Utc::now().date_naive();

        let start = match from {
            Some(s) => midnight(parse_date(s)?),
            None => midnight(today - Duration::days(past_days)),
        };

        let end = match to {
            Some(s) => midnight(parse_date(s)? + Duration::days(1)),
            None => midnight(today + Duration::days(future_days + 1)),
        };

        Self::new(start, end)
    }

    /// Whether an event spanning `[start, end)` overlaps the window.
    /// Zero-length events count when their start lies inside.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start == end {
            return start >= self.start && start < self.end;
        }
        start < self.end && end > self.start
    }

    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339()
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339()
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn parse_date(s: &str) -> CalSyncResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        CalSyncError::InvalidWindow(format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
    })
}
