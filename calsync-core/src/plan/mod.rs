//! Diff planner: turns a match outcome into an ordered list of actions.

mod action_kind;

pub use action_kind::ActionKind;

use std::fmt;

use serde::Serialize;

use crate::event::CanonicalEvent;
use crate::fingerprint::SyncFingerprint;
use crate::matcher::{MatchOutcome, MatchedPair, StaleDestination};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update {
        destination_event_id: String,
    },
    /// Nothing to write. `record` names the matched destination event when
    /// its mapping still has to be written: either there is none yet, or the
    /// source changed since the last sync and `last_synced` must move forward.
    Skip {
        record: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub action: SyncAction,
    pub fingerprint: SyncFingerprint,
    /// The source event, i.e. the desired destination state
    pub event: CanonicalEvent,
}

impl PlannedAction {
    pub fn kind(&self) -> ActionKind {
        match self.action {
            SyncAction::Create => ActionKind::Create,
            SyncAction::Update { .. } => ActionKind::Update,
            SyncAction::Skip { .. } => ActionKind::Skip,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.event)
    }
}

/// Actions for one cycle, sorted by event start.
#[derive(Debug, Default, Serialize)]
pub struct SyncPlan {
    pub actions: Vec<PlannedAction>,
    /// Reported only; the engine never deletes destination events
    pub stale_advisories: Vec<StaleDestination>,
}

impl SyncPlan {
    /// (creates, updates, skips)
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut created = 0;
        let mut updated = 0;
        let mut skipped = 0;

        for action in &self.actions {
            match action.kind() {
                ActionKind::Create => created += 1,
                ActionKind::Update => updated += 1,
                ActionKind::Skip => skipped += 1,
            }
        }

        (created, updated, skipped)
    }
}

/// Build the plan for a match outcome.
///
/// - unmatched source → Create
/// - matched, source changed since last sync (or never synced) and content
///   differs → Update
/// - everything else matched → Skip
/// - stale destination events → advisories
pub fn plan(outcome: MatchOutcome) -> SyncPlan {
    let mut actions: Vec<PlannedAction> = Vec::new();

    for unmatched in outcome.unmatched_source {
        actions.push(PlannedAction {
            action: SyncAction::Create,
            fingerprint: unmatched.fingerprint,
            event: unmatched.event,
        });
    }

    for pair in outcome.matched {
        actions.push(plan_matched(pair));
    }

    // Deterministic apply order: by start, then fingerprint
    actions.sort_by(|a, b| {
        a.event
            .start
            .cmp(&b.event.start)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });

    let mut stale_advisories = outcome.stale_destination;
    stale_advisories.sort_by(|a, b| a.event.start.cmp(&b.event.start));

    SyncPlan {
        actions,
        stale_advisories,
    }
}

fn plan_matched(pair: MatchedPair) -> PlannedAction {
    let destination_event_id = pair.destination.source_id.clone();

    let source_changed = match &pair.mapping {
        Some(mapping) => pair.source.modified_since(mapping.last_synced),
        None => true,
    };

    let action = if source_changed && pair.source.content_differs(&pair.destination) {
        SyncAction::Update {
            destination_event_id,
        }
    } else {
        SyncAction::Skip {
            record: source_changed.then_some(destination_event_id),
        }
    };

    PlannedAction {
        action,
        fingerprint: pair.fingerprint,
        event: pair.source,
    }
}
