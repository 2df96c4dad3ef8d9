use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::MalformedEventError;
use crate::event::CanonicalEvent;
use crate::normalize::{clean, instance_key, midnight, parse_rfc3339};
use crate::raw::{OUTLOOK_INSTANCE_KEY_PROPERTY, OutlookDateTime, OutlookEvent};
use crate::window::SyncWindow;

/// Graph sends 7 fractional digits ("2025-03-19T14:00:00.0000000").
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn parse_local(
    time: Option<&OutlookDateTime>,
    event_id: &str,
    which: &str,
) -> Result<(NaiveDateTime, Option<Tz>), MalformedEventError> {
    let time = time.ok_or_else(|| MalformedEventError::new(event_id, format!("no {which} time")))?;

    let naive = NaiveDateTime::parse_from_str(&time.date_time, GRAPH_DATETIME_FORMAT).map_err(|_| {
        MalformedEventError::new(
            event_id,
            format!("invalid {which} dateTime '{}'", time.date_time),
        )
    })?;

    let zone = match time.time_zone.as_deref() {
        None | Some("UTC") | Some("") => None,
        Some(name) => Some(name.parse::<Tz>().map_err(|_| {
            MalformedEventError::new(event_id, format!("unknown time zone '{name}'"))
        })?),
    };

    Ok((naive, zone))
}

fn to_utc(
    naive: NaiveDateTime,
    zone: Option<Tz>,
    event_id: &str,
) -> Result<DateTime<Utc>, MalformedEventError> {
    match zone {
        None => Ok(naive.and_utc()),
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                MalformedEventError::new(event_id, format!("{naive} does not exist in {}", tz.name()))
            }),
    }
}

/// Calendar date of `instant` on the event's own wall clock.
fn local_date(instant: DateTime<Utc>, zone: Option<Tz>) -> NaiveDate {
    match zone {
        Some(tz) => instant.with_timezone(&tz).date_naive(),
        None => instant.date_naive(),
    }
}

pub(super) fn to_canonical(
    event: &OutlookEvent,
    window: &SyncWindow,
) -> Result<Vec<CanonicalEvent>, MalformedEventError> {
    // calendarView already returns each occurrence; masters would duplicate them
    if event.is_cancelled || event.event_type.as_deref() == Some("seriesMaster") {
        return Ok(Vec::new());
    }

    let (start_local, start_zone) = parse_local(event.start.as_ref(), &event.id, "start")?;
    let (end_local, end_zone) = parse_local(event.end.as_ref(), &event.id, "end")?;

    let is_all_day = event
        .is_all_day
        .ok_or_else(|| MalformedEventError::new(&event.id, "isAllDay is missing"))?;

    let (start, end) = if is_all_day {
        if start_local.time() != NaiveTime::MIN || end_local.time() != NaiveTime::MIN {
            return Err(MalformedEventError::new(
                &event.id,
                "isAllDay is set but start or end is not at midnight",
            ));
        }
        if end_local.date() <= start_local.date() {
            return Err(MalformedEventError::new(
                &event.id,
                "all-day event must end on a later date",
            ));
        }
        // All-day events are floating dates; keep the calendar dates, not the zone offset
        (midnight(start_local.date()), midnight(end_local.date()))
    } else {
        (
            to_utc(start_local, start_zone, &event.id)?,
            to_utc(end_local, end_zone, &event.id)?,
        )
    };

    if end < start {
        return Err(MalformedEventError::new(&event.id, "end is before start"));
    }

    if !window.overlaps(start, end) {
        return Ok(Vec::new());
    }

    let recurrence_instance_key = event
        .single_value_extended_properties
        .iter()
        .find(|p| p.id == OUTLOOK_INSTANCE_KEY_PROPERTY)
        .map(|p| p.value.clone())
        .or_else(|| {
            let is_instance = matches!(
                event.event_type.as_deref(),
                Some("occurrence") | Some("exception")
            );
            if !is_instance {
                return None;
            }
            event
                .original_start
                .as_deref()
                .and_then(parse_rfc3339)
                .map(|original| {
                    if is_all_day {
                        // originalStart is the UTC instant of local midnight
                        instance_key(midnight(local_date(original, start_zone)), true)
                    } else {
                        instance_key(original, false)
                    }
                })
        });

    Ok(vec![CanonicalEvent {
        source_id: event.id.clone(),
        title: event.subject.as_deref().unwrap_or("").trim().to_string(),
        start,
        end,
        is_all_day,
        location: clean(
            event
                .location
                .as_ref()
                .and_then(|l| l.display_name.as_deref()),
        ),
        description: clean(event.body.as_ref().and_then(|b| b.content.as_deref())),
        recurrence_instance_key,
        last_modified: event
            .last_modified_date_time
            .as_deref()
            .and_then(parse_rfc3339),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{OutlookBody, OutlookExtendedProperty, OutlookLocation};

    fn window() -> SyncWindow {
        SyncWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn at(date_time: &str, zone: &str) -> Option<OutlookDateTime> {
        Some(OutlookDateTime {
            date_time: date_time.to_string(),
            time_zone: Some(zone.to_string()),
        })
    }

    fn review() -> OutlookEvent {
        OutlookEvent {
            id: "AAMk1".to_string(),
            subject: Some("Review".to_string()),
            body: Some(OutlookBody {
                content_type: Some("text".to_string()),
                content: Some("Agenda".to_string()),
            }),
            location: Some(OutlookLocation {
                display_name: Some("Room 4".to_string()),
            }),
            start: at("2025-03-19T14:00:00.0000000", "UTC"),
            end: at("2025-03-19T15:00:00.0000000", "UTC"),
            is_all_day: Some(false),
            last_modified_date_time: Some("2025-03-02T08:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn timed_event_in_utc() {
        let events = to_canonical(&review(), &window()).unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.start, Utc.with_ymd_and_hms(2025, 3, 19, 14, 0, 0).unwrap());
        assert_eq!(e.location.as_deref(), Some("Room 4"));
        assert_eq!(e.description.as_deref(), Some("Agenda"));
        assert_eq!(e.recurrence_instance_key, None);
    }

    #[test]
    fn zoned_wall_clock_is_converted() {
        let mut event = review();
        event.start = at("2025-03-19T14:00:00.0000000", "Europe/Berlin");
        event.end = at("2025-03-19T15:00:00.0000000", "Europe/Berlin");

        let e = &to_canonical(&event, &window()).unwrap()[0];
        assert_eq!(e.start, Utc.with_ymd_and_hms(2025, 3, 19, 13, 0, 0).unwrap());
    }

    #[test]
    fn unknown_zone_is_malformed() {
        let mut event = review();
        event.start = at("2025-03-19T14:00:00.0000000", "Pacific Standard Time");
        assert!(to_canonical(&event, &window()).is_err());
    }

    #[test]
    fn all_day_flag_must_agree_with_times() {
        let mut event = review();
        event.is_all_day = Some(true);
        let err = to_canonical(&event, &window()).unwrap_err();
        assert!(err.reason.contains("midnight"));

        event.start = at("2025-03-20T00:00:00.0000000", "Europe/Berlin");
        event.end = at("2025-03-21T00:00:00.0000000", "Europe/Berlin");
        let e = &to_canonical(&event, &window()).unwrap()[0];
        assert!(e.is_all_day);
        assert_eq!(e.start, Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap());
        assert_eq!(e.end, Utc.with_ymd_and_hms(2025, 3, 21, 0, 0, 0).unwrap());
    }

    #[test]
    fn instance_key_round_trips_through_extended_property() {
        let mut event = review();
        event.single_value_extended_properties = vec![OutlookExtendedProperty {
            id: OUTLOOK_INSTANCE_KEY_PROPERTY.to_string(),
            value: "20250319T140000Z".to_string(),
        }];

        let e = &to_canonical(&event, &window()).unwrap()[0];
        assert_eq!(e.recurrence_instance_key.as_deref(), Some("20250319T140000Z"));
    }

    #[test]
    fn all_day_occurrence_key_uses_the_local_date() {
        let mut event = review();
        event.is_all_day = Some(true);
        event.event_type = Some("occurrence".to_string());
        event.start = at("2025-03-19T00:00:00.0000000", "Europe/Berlin");
        event.end = at("2025-03-20T00:00:00.0000000", "Europe/Berlin");
        event.original_start = Some("2025-03-18T23:00:00Z".to_string());

        let e = &to_canonical(&event, &window()).unwrap()[0];
        assert_eq!(e.recurrence_instance_key.as_deref(), Some("20250319"));

        // Timed occurrences keep the UTC instant
        let mut timed = review();
        timed.event_type = Some("occurrence".to_string());
        timed.original_start = Some("2025-03-19T14:00:00Z".to_string());
        let e = &to_canonical(&timed, &window()).unwrap()[0];
        assert_eq!(e.recurrence_instance_key.as_deref(), Some("20250319T140000Z"));
    }

    #[test]
    fn series_masters_and_cancelled_events_are_ignored() {
        let mut master = review();
        master.event_type = Some("seriesMaster".to_string());
        assert!(to_canonical(&master, &window()).unwrap().is_empty());

        let mut cancelled = review();
        cancelled.is_cancelled = true;
        assert!(to_canonical(&cancelled, &window()).unwrap().is_empty());
    }
}
