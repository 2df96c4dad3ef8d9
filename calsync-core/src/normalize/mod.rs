//! Event model normalizer.
//!
//! Turns provider-native events into [`CanonicalEvent`]s: UTC instants,
//! explicit all-day flag, one event per recurring instance inside the
//! sync window. Pure: no I/O, no clock.

mod google;
mod outlook;
mod recurrence;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::MalformedEventError;
use crate::event::CanonicalEvent;
use crate::raw::RawEvent;
use crate::window::SyncWindow;

/// Normalize a single raw event.
///
/// Returns no events for cancelled events or events outside the window,
/// several for a recurring master.
pub fn normalize(
    raw: &RawEvent,
    window: &SyncWindow,
) -> Result<Vec<CanonicalEvent>, MalformedEventError> {
    match raw {
        RawEvent::Google(event) => google::to_canonical(event, window, &HashSet::new()),
        RawEvent::Outlook(event) => outlook::to_canonical(event, window),
    }
}

/// Normalize a provider listing, skipping (and returning) malformed events.
///
/// Unlike [`normalize`], this sees the whole listing, so Google instance
/// exceptions replace the occurrence they override instead of duplicating it.
pub fn normalize_all(
    raws: &[RawEvent],
    window: &SyncWindow,
) -> (Vec<CanonicalEvent>, Vec<MalformedEventError>) {
    let overrides = google_overrides(raws);
    let no_overrides = HashSet::new();

    let mut events = Vec::new();
    let mut rejected = Vec::new();

    for raw in raws {
        let result = match raw {
            RawEvent::Google(event) => {
                let overridden = overrides.get(event.id.as_str()).unwrap_or(&no_overrides);
                google::to_canonical(event, window, overridden)
            }
            RawEvent::Outlook(event) => outlook::to_canonical(event, window),
        };

        match result {
            Ok(normalized) => events.extend(normalized),
            Err(e) => {
                tracing::debug!(
                    provider = %raw.kind(),
                    source_id = %e.source_id,
                    reason = %e.reason,
                    "skipping malformed event"
                );
                rejected.push(e);
            }
        }
    }

    (events, rejected)
}

/// Instance keys overridden by exception events, per master id.
fn google_overrides(raws: &[RawEvent]) -> HashMap<&str, HashSet<String>> {
    let mut overrides: HashMap<&str, HashSet<String>> = HashMap::new();

    for raw in raws {
        if let RawEvent::Google(event) = raw
            && let Some(master_id) = event.recurring_event_id.as_deref()
            && let Some(key) = google::original_instance_key(event)
        {
            overrides.entry(master_id).or_default().insert(key);
        }
    }

    overrides
}

/// Key identifying one instance of a series by its original start:
/// `YYYYMMDD` for all-day instances, `YYYYMMDDTHHMMSSZ` otherwise.
pub(crate) fn instance_key(start: DateTime<Utc>, all_day: bool) -> String {
    if all_day {
        start.format("%Y%m%d").to_string()
    } else {
        start.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Trim, and treat blank strings as missing.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
