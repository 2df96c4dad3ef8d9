use std::fmt;

use serde::Serialize;

use crate::error::{MalformedEventError, ProviderError};
use crate::event::CanonicalEvent;
use crate::matcher::StaleDestination;
use crate::plan::ActionKind;

/// A create or update that reached the destination.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedEvent {
    pub event: CanonicalEvent,
    pub destination_event_id: String,
}

/// A planned action the destination refused (after retries).
#[derive(Debug, Clone, Serialize)]
pub struct FailedAction {
    pub kind: ActionKind,
    /// The source event the action was for
    pub event: CanonicalEvent,
    pub error: ProviderError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    /// Local session check, before any network call
    Session,
    Pull,
    Apply,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStage::Session => write!(f, "session check"),
            CycleStage::Pull => write!(f, "pull"),
            CycleStage::Apply => write!(f, "apply"),
        }
    }
}

/// Why a cycle stopped early.
#[derive(Debug, Clone, Serialize)]
pub struct CycleAbort {
    pub stage: CycleStage,
    pub error: ProviderError,
    /// Planned actions that were never attempted
    pub skipped_actions: usize,
}

impl CycleAbort {
    pub(crate) fn new(stage: CycleStage, error: ProviderError) -> Self {
        CycleAbort {
            stage,
            error,
            skipped_actions: 0,
        }
    }
}

impl fmt::Display for CycleAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted during {}: {}", self.stage, self.error)?;
        if self.skipped_actions > 0 {
            write!(f, " ({} actions not attempted)", self.skipped_actions)?;
        }
        Ok(())
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub created: Vec<AppliedEvent>,
    pub updated: Vec<AppliedEvent>,
    pub skipped: Vec<CanonicalEvent>,
    pub failed: Vec<FailedAction>,
    pub stale_advisories: Vec<StaleDestination>,
    pub rejected: Vec<MalformedEventError>,
    pub aborted: Option<CycleAbort>,
}

impl SyncResult {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Whether every planned action went through
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_none()
    }
}

/// Something the operator should look at, emitted per item to the result sink.
#[derive(Debug, Clone, Copy)]
pub enum Advisory<'a> {
    Failed(&'a FailedAction),
    Stale(&'a StaleDestination),
    Rejected(&'a MalformedEventError),
}

impl SyncResult {
    pub fn advisories(&self) -> impl Iterator<Item = Advisory<'_>> {
        self.failed
            .iter()
            .map(Advisory::Failed)
            .chain(self.stale_advisories.iter().map(Advisory::Stale))
            .chain(self.rejected.iter().map(Advisory::Rejected))
    }
}
