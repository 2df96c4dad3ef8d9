//! One-way sync cycle: pull, normalize, match, plan, apply.

mod result;
mod sink;

pub use result::{Advisory, AppliedEvent, CycleAbort, CycleStage, FailedAction, SyncResult};
pub use sink::{NullSink, ResultSink, TracingSink};

use std::collections::HashSet;

use chrono::Utc;

use crate::error::{CalSyncResult, MalformedEventError, ProviderError};
use crate::matcher::match_events;
use crate::normalize::normalize_all;
use crate::plan::{ActionKind, PlannedAction, SyncAction, SyncPlan, plan};
use crate::provider::{EventSink, EventSource, Session};
use crate::retry::{RetryPolicy, with_retry};
use crate::store::{DestinationMapping, MappingStore};
use crate::window::SyncWindow;

/// Everything a cycle needs besides the mapping store.
pub struct CycleContext<'a> {
    pub source: &'a dyn EventSource,
    pub source_session: &'a Session,
    pub destination: &'a dyn EventSink,
    pub destination_session: &'a Session,
    pub window: SyncWindow,
    pub retry: RetryPolicy,
    pub sink: &'a dyn ResultSink,
    /// Source event ids written by the opposite direction. These are copies,
    /// never originals, so they are left out of the source set.
    pub own_copies: HashSet<String>,
}

/// Plan of a cycle that was not applied.
#[derive(Debug)]
pub struct CyclePreview {
    pub plan: SyncPlan,
    pub rejected: Vec<MalformedEventError>,
}

/// Run one cycle against `store`.
///
/// Provider failures never surface as `Err`: they end up in the result's
/// `failed` list, or in `aborted` when the cycle cannot go on. Only mapping
/// store failures are returned as errors.
pub async fn run_cycle(
    context: &CycleContext<'_>,
    store: &mut dyn MappingStore,
) -> CalSyncResult<SyncResult> {
    let mappings = store.read_all()?;

    let result = match prepare(context, &mappings).await {
        Ok(preview) => apply(context, store, preview).await?,
        Err(abort) => SyncResult {
            aborted: Some(abort),
            ..Default::default()
        },
    };

    emit(context.sink, &result);
    Ok(result)
}

/// Compute the plan without touching the destination or the store.
pub async fn preview_cycle(
    context: &CycleContext<'_>,
    store: &dyn MappingStore,
) -> CalSyncResult<CyclePreview> {
    let mappings = store.read_all()?;

    prepare(context, &mappings)
        .await
        .map_err(|abort| abort.error.into())
}

async fn prepare(
    context: &CycleContext<'_>,
    mappings: &[DestinationMapping],
) -> Result<CyclePreview, CycleAbort> {
    let now = Utc::now();
    for session in [context.source_session, context.destination_session] {
        if session.is_expired(now) {
            return Err(CycleAbort::new(
                CycleStage::Session,
                ProviderError::auth_expired(format!(
                    "{} session for {} has expired",
                    session.provider, session.account
                )),
            ));
        }
    }

    let (source_raw, destination_raw) = tokio::join!(
        with_retry(&context.retry, "list source events", || context
            .source
            .list_events(context.source_session, &context.window)),
        with_retry(&context.retry, "list destination events", || context
            .destination
            .list_events(context.destination_session, &context.window)),
    );
    let source_raw = source_raw.map_err(|e| CycleAbort::new(CycleStage::Pull, e))?;
    let destination_raw = destination_raw.map_err(|e| CycleAbort::new(CycleStage::Pull, e))?;

    let (mut source_events, mut rejected) = normalize_all(&source_raw, &context.window);
    let (destination_events, destination_rejected) =
        normalize_all(&destination_raw, &context.window);
    rejected.extend(destination_rejected);

    let pulled = source_events.len();
    source_events.retain(|event| !context.own_copies.contains(&event.source_id));

    tracing::debug!(
        source = source_events.len(),
        own_copies = pulled - source_events.len(),
        destination = destination_events.len(),
        mappings = mappings.len(),
        "pulled events"
    );

    let plan = plan(match_events(source_events, destination_events, mappings));

    Ok(CyclePreview { plan, rejected })
}

async fn apply(
    context: &CycleContext<'_>,
    store: &mut dyn MappingStore,
    preview: CyclePreview,
) -> CalSyncResult<SyncResult> {
    let CyclePreview { plan, rejected } = preview;
    let mut result = SyncResult {
        stale_advisories: plan.stale_advisories,
        rejected,
        ..Default::default()
    };

    let total = plan.actions.len();
    for (index, planned) in plan.actions.into_iter().enumerate() {
        let kind = planned.kind();
        let PlannedAction {
            action,
            fingerprint,
            event,
        } = planned;

        let outcome = match action {
            SyncAction::Create => with_retry(&context.retry, "create event", || {
                context
                    .destination
                    .create_event(context.destination_session, &event)
            })
            .await,
            SyncAction::Update {
                destination_event_id,
            } => with_retry(&context.retry, "update event", || {
                context.destination.update_event(
                    context.destination_session,
                    &destination_event_id,
                    &event,
                )
            })
            .await
            .map(|()| destination_event_id),
            SyncAction::Skip { record } => {
                if let Some(destination_event_id) = record {
                    tracing::debug!(
                        %destination_event_id,
                        fingerprint = fingerprint.short(),
                        title = %event.title,
                        "recording mapping for unchanged destination event"
                    );
                    store.upsert(DestinationMapping::new(
                        fingerprint,
                        destination_event_id,
                        Utc::now(),
                    ))?;
                }
                result.skipped.push(event);
                continue;
            }
        };

        match outcome {
            Ok(destination_event_id) => {
                tracing::info!(
                    action = %kind,
                    %destination_event_id,
                    fingerprint = fingerprint.short(),
                    title = %event.title,
                    start = %event.render_time(),
                    "applied"
                );
                store.upsert(DestinationMapping::new(
                    fingerprint,
                    destination_event_id.clone(),
                    Utc::now(),
                ))?;

                let applied = AppliedEvent {
                    event,
                    destination_event_id,
                };
                match kind {
                    ActionKind::Create => result.created.push(applied),
                    _ => result.updated.push(applied),
                }
            }
            Err(error) => {
                let abort = error.is_auth_expired();
                result.failed.push(FailedAction {
                    kind,
                    event,
                    error: error.clone(),
                });

                if abort {
                    result.aborted = Some(CycleAbort {
                        stage: CycleStage::Apply,
                        error,
                        skipped_actions: total - index - 1,
                    });
                    break;
                }
            }
        }
    }

    Ok(result)
}

fn emit(sink: &dyn ResultSink, result: &SyncResult) {
    for advisory in result.advisories() {
        sink.record_advisory(&advisory);
    }
    sink.record_result(result);
}
