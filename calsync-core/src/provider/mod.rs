//! Provider adapter seam.
//!
//! The engine talks to calendars only through [`EventSource`] and
//! [`EventSink`]. [`ProcessProvider`] implements both by delegating to an
//! external `calsync-provider-<name>` binary; tests plug in fakes.

mod process;
pub mod protocol;

pub use process::ProcessProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::event::CanonicalEvent;
use crate::raw::RawEvent;
use crate::window::SyncWindow;

/// A time-bounded capability for one provider account.
///
/// Acquired before a cycle starts (possibly interactively); the engine only
/// reads it and never refreshes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub provider: String,
    pub account: String,
    /// Opaque to the engine; only the provider binary interprets it
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Read side of a calendar.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// List native events overlapping `window`. Recurring masters may be
    /// returned unexpanded; the normalizer expands them.
    async fn list_events(
        &self,
        session: &Session,
        window: &SyncWindow,
    ) -> Result<Vec<RawEvent>, ProviderError>;
}

/// Write side of a calendar, used for the destination.
#[async_trait]
pub trait EventSink: EventSource {
    /// Create an event and return its provider-assigned id.
    async fn create_event(
        &self,
        session: &Session,
        event: &CanonicalEvent,
    ) -> Result<String, ProviderError>;

    async fn update_event(
        &self,
        session: &Session,
        destination_event_id: &str,
        event: &CanonicalEvent,
    ) -> Result<(), ProviderError>;
}
