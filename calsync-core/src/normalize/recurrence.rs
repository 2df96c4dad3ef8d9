//! RRULE expansion for recurring events.
//!
//! Expands a master event's recurrence rules into concrete instance starts
//! within a sync window, respecting EXDATEs and instance overrides.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::constants::MAX_RECURRENCE_INSTANCES;
use crate::normalize::{instance_key, midnight};
use crate::window::SyncWindow;

/// Start of a recurring master, in the form that drives expansion.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MasterStart {
    /// All-day series, expanded on UTC dates
    Date(NaiveDate),
    /// Timed series without a usable zone
    Utc(DateTime<Utc>),
    /// Timed series expanded in its own zone so DST keeps the wall-clock time
    Zoned(DateTime<Utc>, Tz),
}

impl MasterStart {
    fn is_all_day(&self) -> bool {
        matches!(self, MasterStart::Date(_))
    }

    fn dtstart_line(&self) -> String {
        match self {
            MasterStart::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
            MasterStart::Utc(dt) => format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
            MasterStart::Zoned(dt, tz) => format!(
                "DTSTART;TZID={}:{}",
                tz.name(),
                dt.with_timezone(tz).format("%Y%m%dT%H%M%S")
            ),
        }
    }

    /// Zone used to read floating EXDATE values
    fn zone(&self) -> Option<Tz> {
        match self {
            MasterStart::Zoned(_, tz) => Some(*tz),
            _ => None,
        }
    }
}

/// One generated occurrence.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub instance_key: String,
}

/// Occurrences of one master inside the window.
#[derive(Debug)]
pub(crate) struct Expansion {
    pub occurrences: Vec<Occurrence>,
    /// Expansion stopped at `MAX_RECURRENCE_INSTANCES`; later ones are missing
    pub truncated: bool,
}

/// Expand `rules` (the master's RRULE/EXDATE lines) into occurrences
/// overlapping `window`. Occurrences whose key is in `overridden` are left
/// out because an exception event replaces (or cancels) them.
pub(crate) fn expand(
    master_start: MasterStart,
    duration: Duration,
    rules: &[String],
    window: &SyncWindow,
    overridden: &HashSet<String>,
) -> Result<Expansion, String> {
    let rrule_lines: Vec<String> = rules
        .iter()
        .filter(|line| line.starts_with("RRULE:"))
        .map(|line| utc_until(line))
        .collect();

    if rrule_lines.is_empty() {
        return Err("recurrence has no RRULE".to_string());
    }

    let mut lines = vec![master_start.dtstart_line()];
    lines.extend(rrule_lines);
    let rrule_str = lines.join("\n");

    let rrule_set: RRuleSet = rrule_str
        .parse()
        .map_err(|e| format!("Failed to parse RRULE: {}", e))?;

    let excluded = exdate_keys(rules, &master_start);

    // Pad the query so instances that started before the window but are still
    // running are found, then filter exactly below.
    let tz: rrule::Tz = Utc.into();
    let after = (window.start - duration - Duration::seconds(1)).with_timezone(&tz);
    let before = (window.end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set
        .after(after)
        .before(before)
        .all(MAX_RECURRENCE_INSTANCES);

    let mut occurrences = Vec::new();

    for occ in &result.dates {
        let (start, end) = if master_start.is_all_day() {
            let day = occ.with_timezone(&Utc).date_naive();
            let start = midnight(day);
            (start, start + duration)
        } else {
            let start = occ.with_timezone(&Utc);
            (start, start + duration)
        };

        let key = instance_key(start, master_start.is_all_day());

        if excluded.contains(&key) || overridden.contains(&key) {
            continue;
        }
        if !window.overlaps(start, end) {
            continue;
        }

        occurrences.push(Occurrence {
            start,
            end,
            instance_key: key,
        });
    }

    Ok(Expansion {
        occurrences,
        truncated: result.limited,
    })
}

/// The rrule crate insists on a UTC UNTIL. Google sometimes sends a bare
/// date (all-day series) or a floating datetime.
fn utc_until(line: &str) -> String {
    let Some((head, rule)) = line.split_once(':') else {
        return line.to_string();
    };

    let parts: Vec<String> = rule
        .split(';')
        .map(|part| match part.strip_prefix("UNTIL=") {
            Some(value) if value.len() == 8 => format!("UNTIL={}T235959Z", value),
            Some(value) if !value.ends_with('Z') => format!("UNTIL={}Z", value),
            _ => part.to_string(),
        })
        .collect();

    format!("{}:{}", head, parts.join(";"))
}

/// Collect EXDATE values as instance keys.
///
/// Formats seen in the wild:
/// - `EXDATE;TZID=America/New_York:20240108T100000`
/// - `EXDATE:20240108T100000Z`
/// - `EXDATE;VALUE=DATE:20240108,20240115`
fn exdate_keys(rules: &[String], master_start: &MasterStart) -> HashSet<String> {
    rules
        .iter()
        .filter(|line| line.starts_with("EXDATE"))
        .filter_map(|line| {
            let (params_part, values) = line.split_once(':')?;
            let params = params_part.strip_prefix("EXDATE").unwrap_or("");
            let params = params.strip_prefix(';').unwrap_or(params);

            let tzid = params
                .split(';')
                .find_map(|p| p.strip_prefix("TZID="))
                .and_then(|name| name.parse::<Tz>().ok());
            let is_date = params.split(';').any(|p| p == "VALUE=DATE");

            Some(
                values
                    .split(',')
                    .filter_map(|v| exdate_key(v.trim(), tzid, is_date, master_start))
                    .collect::<Vec<_>>(),
            )
        })
        .flatten()
        .collect()
}

fn exdate_key(
    value: &str,
    tzid: Option<Tz>,
    is_date: bool,
    master_start: &MasterStart,
) -> Option<String> {
    if is_date || value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(instance_key(midnight(date), true));
    }

    let utc = if let Some(naive) = value.strip_suffix('Z') {
        NaiveDateTime::parse_from_str(naive, "%Y%m%dT%H%M%S")
            .ok()?
            .and_utc()
    } else {
        let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
        match tzid.or(master_start.zone()) {
            Some(tz) => tz.from_local_datetime(&naive).earliest()?.with_timezone(&Utc),
            None => naive.and_utc(),
        }
    };

    Some(instance_key(utc, master_start.is_all_day()))
}
