//! Error types for calsync.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that escape a sync cycle or the surrounding setup.
///
/// Per-event problems never show up here: they are collected in the
/// cycle's `SyncResult` instead.
#[derive(Error, Debug)]
pub enum CalSyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid sync window: {0}")]
    InvalidWindow(String),

    #[error("Mapping store error: {0}")]
    Store(String),

    #[error("Mapping store {0} is locked by another sync cycle")]
    LeaseHeld(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for calsync operations.
pub type CalSyncResult<T> = Result<T, CalSyncError>;

/// How a provider call failed. Drives retry and abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The session is no longer valid. Aborts the cycle.
    AuthExpired,
    RateLimited,
    Transient,
    /// The provider refused the request (validation error and the like).
    Rejected,
}

impl ProviderErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ProviderErrorKind::RateLimited | ProviderErrorKind::Transient)
    }
}

/// A failed call to a provider adapter.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError {
            kind,
            message: message.into(),
        }
    }

    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::AuthExpired, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Rejected, message)
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind == ProviderErrorKind::AuthExpired
    }
}

/// A raw provider event that could not be turned into a canonical event.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Malformed event '{source_id}': {reason}")]
pub struct MalformedEventError {
    pub source_id: String,
    pub reason: String,
}

impl MalformedEventError {
    pub fn new(source_id: &str, reason: impl Into<String>) -> Self {
        MalformedEventError {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}
