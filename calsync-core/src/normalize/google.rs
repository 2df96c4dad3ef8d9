use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::constants::MAX_RECURRENCE_INSTANCES;
use crate::error::MalformedEventError;
use crate::event::CanonicalEvent;
use crate::normalize::recurrence::{self, MasterStart};
use crate::normalize::{clean, instance_key, midnight, parse_rfc3339};
use crate::raw::{GoogleEvent, GoogleEventTime, INSTANCE_KEY_PROPERTY};
use crate::window::SyncWindow;

/// Google encodes all-day-ness by which field is set: `date` or `dateTime`.
enum GoogleTime {
    Timed(DateTime<Utc>),
    AllDay(NaiveDate),
}

impl GoogleTime {
    fn instant(&self) -> DateTime<Utc> {
        match self {
            GoogleTime::Timed(dt) => *dt,
            GoogleTime::AllDay(d) => midnight(*d),
        }
    }
}

fn parse_time(
    time: Option<&GoogleEventTime>,
    event_id: &str,
    which: &str,
) -> Result<GoogleTime, MalformedEventError> {
    let time = time.ok_or_else(|| MalformedEventError::new(event_id, format!("no {which} time")))?;

    match (time.date_time.as_deref(), time.date.as_deref()) {
        (Some(dt), None) => parse_rfc3339(dt).map(GoogleTime::Timed).ok_or_else(|| {
            MalformedEventError::new(event_id, format!("invalid {which} dateTime '{dt}'"))
        }),
        (None, Some(d)) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map(GoogleTime::AllDay)
            .map_err(|_| MalformedEventError::new(event_id, format!("invalid {which} date '{d}'"))),
        (Some(_), Some(_)) => Err(MalformedEventError::new(
            event_id,
            format!("{which} has both date and dateTime"),
        )),
        (None, None) => Err(MalformedEventError::new(event_id, format!("no {which} time"))),
    }
}

/// Key of the instance an exception event replaces, if it is one.
pub(super) fn original_instance_key(event: &GoogleEvent) -> Option<String> {
    let original = event.original_start_time.as_ref()?;
    match parse_time(Some(original), &event.id, "original start").ok()? {
        GoogleTime::Timed(dt) => Some(instance_key(dt, false)),
        GoogleTime::AllDay(d) => Some(instance_key(midnight(d), true)),
    }
}

pub(super) fn to_canonical(
    event: &GoogleEvent,
    window: &SyncWindow,
    overridden: &HashSet<String>,
) -> Result<Vec<CanonicalEvent>, MalformedEventError> {
    if event.status.as_deref() == Some("cancelled") {
        return Ok(Vec::new());
    }

    let start = parse_time(event.start.as_ref(), &event.id, "start")?;
    let end = parse_time(event.end.as_ref(), &event.id, "end")?;

    let is_all_day = match (&start, &end) {
        (GoogleTime::AllDay(_), GoogleTime::AllDay(_)) => true,
        (GoogleTime::Timed(_), GoogleTime::Timed(_)) => false,
        _ => {
            return Err(MalformedEventError::new(
                &event.id,
                "start and end disagree on whether the event is all-day",
            ));
        }
    };

    let start_instant = start.instant();
    let end_instant = end.instant();

    if end_instant < start_instant {
        return Err(MalformedEventError::new(&event.id, "end is before start"));
    }
    if is_all_day && end_instant == start_instant {
        return Err(MalformedEventError::new(
            &event.id,
            "all-day event must end on a later date",
        ));
    }

    let template = CanonicalEvent {
        source_id: event.id.clone(),
        title: event.summary.as_deref().unwrap_or("").trim().to_string(),
        start: start_instant,
        end: end_instant,
        is_all_day,
        location: clean(event.location.as_deref()),
        description: clean(event.description.as_deref()),
        recurrence_instance_key: None,
        last_modified: event.updated.as_deref().and_then(parse_rfc3339),
    };

    if !event.recurrence.is_empty() && event.recurring_event_id.is_none() {
        let master_start = match start {
            GoogleTime::AllDay(d) => MasterStart::Date(d),
            GoogleTime::Timed(dt) => {
                let zone = event
                    .start
                    .as_ref()
                    .and_then(|s| s.time_zone.as_deref())
                    .and_then(|name| name.parse::<Tz>().ok());
                match zone {
                    Some(tz) => MasterStart::Zoned(dt, tz),
                    None => MasterStart::Utc(dt),
                }
            }
        };

        let expansion = recurrence::expand(
            master_start,
            end_instant - start_instant,
            &event.recurrence,
            window,
            overridden,
        )
        .map_err(|reason| MalformedEventError::new(&event.id, reason))?;

        if expansion.truncated {
            tracing::warn!(
                master_id = %event.id,
                limit = MAX_RECURRENCE_INSTANCES,
                "recurring event has more instances in the window than the cap; later ones are not synced"
            );
        }

        return Ok(expansion
            .occurrences
            .into_iter()
            .map(|occ| CanonicalEvent {
                start: occ.start,
                end: occ.end,
                recurrence_instance_key: Some(occ.instance_key),
                ..template.clone()
            })
            .collect());
    }

    if !window.overlaps(start_instant, end_instant) {
        return Ok(Vec::new());
    }

    // Exceptions are keyed by the start they replace; single events we
    // created ourselves carry the key in a private extended property.
    let recurrence_instance_key = original_instance_key(event).or_else(|| {
        event
            .extended_properties
            .as_ref()
            .and_then(|props| props.private.get(INSTANCE_KEY_PROPERTY))
            .cloned()
    });

    Ok(vec![CanonicalEvent {
        recurrence_instance_key,
        ..template
    }])
}
