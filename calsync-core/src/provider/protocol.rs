//! Defines the JSON protocol used between calsync and provider binaries
//! over stdin/stdout.
//!
//! One request per process: calsync writes a single JSON line, the provider
//! answers with a single JSON document.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{ProviderError, ProviderErrorKind};
use crate::event::CanonicalEvent;
use crate::provider::Session;
use crate::raw::RawEvent;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    OpenSession,
    ListEvents,
    CreateEvent,
    UpdateEvent,
}

/// Request sent from calsync to provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from provider to calsync.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        /// Missing kinds are treated as rejected: not retried
        #[serde(default)]
        error_kind: Option<ProviderErrorKind>,
    },
}

impl<T> Response<T> {
    pub fn into_result(self) -> Result<T, ProviderError> {
        match self {
            Response::Success { data } => Ok(data),
            Response::Error { error, error_kind } => Err(ProviderError::new(
                error_kind.unwrap_or(ProviderErrorKind::Rejected),
                error,
            )),
        }
    }
}

/// Acquire a session for an account. May involve user interaction
/// (browser login, second factor).
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSession {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub account: String,
}

impl ProviderCommand for OpenSession {
    type Response = Session;
    fn command() -> Command {
        Command::OpenSession
    }
}

/// List events within a time range.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    /// Provider-specific config (e.g. calendar_id)
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub session: Session,
    pub from: String,
    pub to: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<RawEvent>;
    fn command() -> Command {
        Command::ListEvents
    }
}

/// Create a new event. The provider writes `recurrence_instance_key` into its
/// extended-property slot so it comes back on the next listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub session: Session,
    pub event: CanonicalEvent,
}

impl ProviderCommand for CreateEvent {
    /// Provider-assigned event id
    type Response = String;
    fn command() -> Command {
        Command::CreateEvent
    }
}

/// Overwrite an existing event with the given content.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub session: Session,
    pub event_id: String,
    pub event: CanonicalEvent,
}

impl ProviderCommand for UpdateEvent {
    type Response = ();
    fn command() -> Command {
        Command::UpdateEvent
    }
}
