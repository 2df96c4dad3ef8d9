//! Native event payloads as returned by the provider adapters.
//!
//! Field names follow each provider's REST API so providers can forward
//! their API responses without reshaping them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Extended property used to round-trip a recurrence instance key through
/// providers that only store single events.
pub const INSTANCE_KEY_PROPERTY: &str = "calsyncInstanceKey";

/// Graph single-value extended property id carrying the instance key.
pub const OUTLOOK_INSTANCE_KEY_PROPERTY: &str =
    "String {66f5a359-4659-4830-9070-00047ec6ac6e} Name calsyncInstanceKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
    Outlook,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Outlook => write!(f, "outlook"),
        }
    }
}

/// A provider-native event, tagged with the provider it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum RawEvent {
    Google(GoogleEvent),
    Outlook(OutlookEvent),
}

impl RawEvent {
    pub fn kind(&self) -> ProviderKind {
        match self {
            RawEvent::Google(_) => ProviderKind::Google,
            RawEvent::Outlook(_) => ProviderKind::Outlook,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RawEvent::Google(e) => &e.id,
            RawEvent::Outlook(e) => &e.id,
        }
    }
}

// ============================================================================
// Google Calendar v3
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// "confirmed", "tentative" or "cancelled"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<GoogleEventTime>,
    #[serde(default)]
    pub end: Option<GoogleEventTime>,
    /// RRULE, EXDATE and RDATE lines for master events
    #[serde(default)]
    pub recurrence: Vec<String>,
    /// Set on instance exceptions: id of the master event
    #[serde(default)]
    pub recurring_event_id: Option<String>,
    /// Set on instance exceptions: the start the instance had before it was moved
    #[serde(default)]
    pub original_start_time: Option<GoogleEventTime>,
    /// RFC 3339 last modification time
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub extended_properties: Option<GoogleExtendedProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventTime {
    /// RFC 3339 timestamp with offset (timed events)
    #[serde(default)]
    pub date_time: Option<String>,
    /// YYYY-MM-DD (all-day events)
    #[serde(default)]
    pub date: Option<String>,
    /// IANA zone name, used to expand recurrences
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleExtendedProperties {
    #[serde(default)]
    pub private: HashMap<String, String>,
}

// ============================================================================
// Microsoft Graph
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookEvent {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<OutlookBody>,
    #[serde(default)]
    pub location: Option<OutlookLocation>,
    #[serde(default)]
    pub start: Option<OutlookDateTime>,
    #[serde(default)]
    pub end: Option<OutlookDateTime>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub is_cancelled: bool,
    /// "singleInstance", "occurrence", "exception" or "seriesMaster"
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    /// Original start of an occurrence/exception (RFC 3339, UTC)
    #[serde(default)]
    pub original_start: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub single_value_extended_properties: Vec<OutlookExtendedProperty>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookLocation {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Graph wall-clock time: naive local `dateTime` plus a zone name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookDateTime {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlookExtendedProperty {
    pub id: String,
    pub value: String,
}
