//! Where cycle results go once a cycle is over.

use crate::sync::result::{Advisory, SyncResult};

pub trait ResultSink: Send + Sync {
    fn record_result(&self, result: &SyncResult);
    fn record_advisory(&self, advisory: &Advisory<'_>);
}

/// Emits results as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn record_result(&self, result: &SyncResult) {
        match &result.aborted {
            Some(abort) => tracing::error!(
                stage = %abort.stage,
                kind = ?abort.error.kind,
                created = result.created.len(),
                updated = result.updated.len(),
                failed = result.failed.len(),
                not_attempted = abort.skipped_actions,
                "sync cycle aborted: {}",
                abort.error.message
            ),
            None => tracing::info!(
                created = result.created.len(),
                updated = result.updated.len(),
                skipped = result.skipped.len(),
                failed = result.failed.len(),
                stale = result.stale_advisories.len(),
                rejected = result.rejected.len(),
                "sync cycle finished"
            ),
        }
    }

    fn record_advisory(&self, advisory: &Advisory<'_>) {
        match advisory {
            Advisory::Failed(failed) => tracing::warn!(
                action = %failed.kind,
                source_id = %failed.event.source_id,
                title = %failed.event.title,
                kind = ?failed.error.kind,
                "action failed: {}",
                failed.error.message
            ),
            Advisory::Stale(stale) => tracing::warn!(
                destination_event_id = %stale.destination_event_id,
                title = %stale.event.title,
                start = %stale.event.render_time(),
                "destination event no longer has a source; left in place"
            ),
            Advisory::Rejected(rejected) => tracing::warn!(
                source_id = %rejected.source_id,
                "rejected malformed event: {}",
                rejected.reason
            ),
        }
    }
}

/// Discards everything. For previews and callers that render results themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record_result(&self, _result: &SyncResult) {}
    fn record_advisory(&self, _advisory: &Advisory<'_>) {}
}
