//! Provider-neutral event types.
//!
//! Providers hand over their native events (see [`crate::raw`]), the
//! normalizer turns them into [`CanonicalEvent`]s, and everything after that
//! (fingerprinting, matching, planning) works exclusively with these.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event (provider-neutral, UTC-normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Opaque id assigned by the provider the event came from
    pub source_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    /// For all-day events this is midnight after the last day (exclusive)
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Identifies one instance of a recurring series
    pub recurrence_instance_key: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CanonicalEvent {
    /// Whether any synced field differs. Provider ids and timestamps are ignored.
    pub fn content_differs(&self, other: &CanonicalEvent) -> bool {
        self.title != other.title
            || self.start != other.start
            || self.end != other.end
            || self.is_all_day != other.is_all_day
            || self.recurrence_instance_key != other.recurrence_instance_key
            || non_empty(&self.location) != non_empty(&other.location)
            || non_empty(&self.description) != non_empty(&other.description)
    }

    /// Whether the source changed after the given sync time.
    /// Events without a modification time always count as changed.
    pub fn modified_since(&self, synced: DateTime<Utc>) -> bool {
        match self.last_modified {
            Some(modified) => modified > synced,
            None => true,
        }
    }

    /// Human-readable start time, e.g. "2025-03-20 15:00" or "2025-03-20 (all day)"
    pub fn render_time(&self) -> String {
        if self.is_all_day {
            format!("{} (all day)", self.start.format("%Y-%m-%d"))
        } else {
            self.start.format("%Y-%m-%d %H:%M").to_string()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "(untitled)")
        } else {
            write!(f, "{}", self.title)
        }
    }
}
