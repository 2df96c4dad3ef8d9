//! End-to-end cycles against in-memory calendars.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use calsync_core::error::{ProviderError, ProviderErrorKind};
use calsync_core::event::CanonicalEvent;
use calsync_core::provider::{EventSink, EventSource, Session};
use calsync_core::raw::{
    GoogleEvent, GoogleEventTime, OUTLOOK_INSTANCE_KEY_PROPERTY, OutlookBody, OutlookDateTime,
    OutlookEvent, OutlookExtendedProperty, OutlookLocation, RawEvent,
};
use calsync_core::retry::RetryPolicy;
use calsync_core::store::{FileMappingStore, MappingStore, MemoryMappingStore};
use calsync_core::sync::{
    Advisory, CycleContext, CycleStage, ResultSink, SyncResult, TracingSink, preview_cycle,
    run_cycle,
};
use calsync_core::window::SyncWindow;

// ============================================================================
// Fakes
// ============================================================================

/// Google-shaped source calendar.
#[derive(Default)]
struct FakeGoogle {
    events: Mutex<Vec<GoogleEvent>>,
    list_failures: Mutex<VecDeque<ProviderError>>,
    list_calls: AtomicUsize,
}

impl FakeGoogle {
    fn with_events(events: Vec<GoogleEvent>) -> Self {
        FakeGoogle {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    fn fail_next_lists(&self, errors: impl IntoIterator<Item = ProviderError>) {
        self.list_failures.lock().unwrap().extend(errors);
    }

    fn set_events(&self, events: Vec<GoogleEvent>) {
        *self.events.lock().unwrap() = events;
    }
}

#[async_trait]
impl EventSource for FakeGoogle {
    async fn list_events(
        &self,
        _session: &Session,
        _window: &SyncWindow,
    ) -> Result<Vec<RawEvent>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .map(RawEvent::Google)
            .collect())
    }
}

#[derive(Default)]
struct OutlookState {
    events: Vec<OutlookEvent>,
    next_id: usize,
    /// Titles whose writes fail, with the error to fail with
    failing: HashMap<String, ProviderError>,
    creates: usize,
    updates: usize,
}

/// Outlook-shaped destination calendar.
#[derive(Default)]
struct FakeOutlook {
    state: Mutex<OutlookState>,
}

impl FakeOutlook {
    fn fail_writes_for(&self, title: &str, error: ProviderError) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(title.to_string(), error);
    }

    fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| e.subject.clone())
            .collect();
        titles.sort();
        titles
    }

    fn writes(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.creates, state.updates)
    }

    /// Change an event's location the way a user would in the Outlook UI.
    fn set_location(&self, title: &str, location: &str) {
        let mut state = self.state.lock().unwrap();
        for event in state
            .events
            .iter_mut()
            .filter(|e| e.subject.as_deref() == Some(title))
        {
            event.location = Some(OutlookLocation {
                display_name: Some(location.to_string()),
            });
            event.last_modified_date_time = Some(Utc::now().to_rfc3339());
        }
    }

    /// Seed an event as if someone had created it by hand.
    fn insert(&self, id: &str, event: &CanonicalEvent) {
        self.state
            .lock()
            .unwrap()
            .events
            .push(to_outlook(id, event));
    }
}

fn graph_time(time: DateTime<Utc>) -> Option<OutlookDateTime> {
    Some(OutlookDateTime {
        date_time: time.format("%Y-%m-%dT%H:%M:%S%.9f").to_string(),
        time_zone: Some("UTC".to_string()),
    })
}

fn to_outlook(id: &str, event: &CanonicalEvent) -> OutlookEvent {
    OutlookEvent {
        id: id.to_string(),
        subject: Some(event.title.clone()),
        body: event.description.clone().map(|content| OutlookBody {
            content_type: Some("text".to_string()),
            content: Some(content),
        }),
        location: event.location.clone().map(|name| OutlookLocation {
            display_name: Some(name),
        }),
        start: graph_time(event.start),
        end: graph_time(event.end),
        is_all_day: Some(event.is_all_day),
        event_type: Some("singleInstance".to_string()),
        last_modified_date_time: Some(Utc::now().to_rfc3339()),
        single_value_extended_properties: event
            .recurrence_instance_key
            .iter()
            .map(|key| OutlookExtendedProperty {
                id: OUTLOOK_INSTANCE_KEY_PROPERTY.to_string(),
                value: key.clone(),
            })
            .collect(),
        ..Default::default()
    }
}

#[async_trait]
impl EventSource for FakeOutlook {
    async fn list_events(
        &self,
        _session: &Session,
        _window: &SyncWindow,
    ) -> Result<Vec<RawEvent>, ProviderError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .cloned()
            .map(RawEvent::Outlook)
            .collect())
    }
}

#[async_trait]
impl EventSink for FakeOutlook {
    async fn create_event(
        &self,
        _session: &Session,
        event: &CanonicalEvent,
    ) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.failing.get(&event.title) {
            return Err(err.clone());
        }

        state.next_id += 1;
        let id = format!("AAMk-{}", state.next_id);
        state.events.push(to_outlook(&id, event));
        state.creates += 1;
        Ok(id)
    }

    async fn update_event(
        &self,
        _session: &Session,
        destination_event_id: &str,
        event: &CanonicalEvent,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.failing.get(&event.title) {
            return Err(err.clone());
        }

        let slot = state
            .events
            .iter_mut()
            .find(|e| e.id == destination_event_id)
            .ok_or_else(|| ProviderError::rejected("no such event"))?;
        *slot = to_outlook(destination_event_id, event);
        state.updates += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    advisories: Mutex<Vec<String>>,
    results: AtomicUsize,
}

impl ResultSink for RecordingSink {
    fn record_result(&self, _result: &SyncResult) {
        self.results.fetch_add(1, Ordering::SeqCst);
    }

    fn record_advisory(&self, advisory: &Advisory<'_>) {
        let line = match advisory {
            Advisory::Failed(f) => format!("failed {}", f.event.title),
            Advisory::Stale(s) => format!("stale {}", s.event.title),
            Advisory::Rejected(r) => format!("rejected {}", r.source_id),
        };
        self.advisories.lock().unwrap().push(line);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn march(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn window() -> SyncWindow {
    SyncWindow::new(march(1, 0), Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()).unwrap()
}

fn session(provider: &str) -> Session {
    Session {
        provider: provider.to_string(),
        account: "me@example.com".to_string(),
        token: "token".to_string(),
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}

fn google_time(time: DateTime<Utc>) -> Option<GoogleEventTime> {
    Some(GoogleEventTime {
        date_time: Some(time.to_rfc3339()),
        ..Default::default()
    })
}

fn google(id: &str, title: &str, day: u32, start_hour: u32, end_hour: u32) -> GoogleEvent {
    GoogleEvent {
        id: id.to_string(),
        summary: Some(title.to_string()),
        status: Some("confirmed".to_string()),
        start: google_time(march(day, start_hour)),
        end: google_time(march(day, end_hour)),
        updated: Some("2025-02-20T12:00:00Z".to_string()),
        ..Default::default()
    }
}

/// X: Monday 9-10 "Standup", Y: Wednesday 14-15 "Review"
fn standup_and_review() -> Vec<GoogleEvent> {
    vec![
        google("g-x", "Standup", 17, 9, 10),
        google("g-y", "Review", 19, 14, 15),
    ]
}

struct Harness {
    source: FakeGoogle,
    destination: FakeOutlook,
    source_session: Session,
    destination_session: Session,
    sink: RecordingSink,
}

impl Harness {
    fn new(events: Vec<GoogleEvent>) -> Self {
        Harness {
            source: FakeGoogle::with_events(events),
            destination: FakeOutlook::default(),
            source_session: session("google"),
            destination_session: session("outlook"),
            sink: RecordingSink::default(),
        }
    }

    fn context(&self) -> CycleContext<'_> {
        CycleContext {
            source: &self.source,
            source_session: &self.source_session,
            destination: &self.destination,
            destination_session: &self.destination_session,
            window: window(),
            retry: RetryPolicy::immediate(3),
            sink: &self.sink,
            own_copies: HashSet::new(),
        }
    }

    /// Context for copying the destination back into `originals`.
    fn reverse_context<'a>(
        &'a self,
        originals: &'a FakeOutlook,
        own_copies: HashSet<String>,
    ) -> CycleContext<'a> {
        CycleContext {
            source: &self.destination,
            source_session: &self.destination_session,
            destination: originals,
            destination_session: &self.source_session,
            window: window(),
            retry: RetryPolicy::immediate(3),
            sink: &TracingSink,
            own_copies,
        }
    }

    async fn cycle(&self, store: &mut dyn MappingStore) -> SyncResult {
        run_cycle(&self.context(), store).await.unwrap()
    }

    fn advisories(&self) -> Vec<String> {
        self.sink.advisories.lock().unwrap().clone()
    }
}

fn created_titles(result: &SyncResult) -> Vec<&str> {
    result
        .created
        .iter()
        .map(|a| a.event.title.as_str())
        .collect()
}

// ============================================================================
// Cycles
// ============================================================================

#[tokio::test]
async fn first_cycle_creates_and_second_cycle_skips() {
    let harness = Harness::new(standup_and_review());
    let mut store = MemoryMappingStore::new();

    let first = harness.cycle(&mut store).await;
    assert_eq!(created_titles(&first), vec!["Standup", "Review"]);
    assert!(first.updated.is_empty());
    assert!(first.is_clean());
    assert_eq!(store.len(), 2);

    let second = harness.cycle(&mut store).await;
    assert!(second.created.is_empty());
    assert!(second.updated.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(store.len(), 2);

    assert_eq!(harness.destination.titles(), vec!["Review", "Standup"]);
    assert_eq!(harness.destination.writes(), (2, 0));
    assert_eq!(harness.sink.results.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_action_does_not_stop_the_others() {
    let harness = Harness::new(vec![
        google("g-a", "A", 17, 9, 10),
        google("g-b", "B", 18, 9, 10),
        google("g-c", "C", 19, 9, 10),
    ]);
    harness
        .destination
        .fail_writes_for("B", ProviderError::rejected("subject not allowed"));
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(created_titles(&result), vec!["A", "C"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].event.title, "B");
    assert_eq!(result.failed[0].error.kind, ProviderErrorKind::Rejected);
    assert!(result.aborted.is_none());
    assert_eq!(store.len(), 2);
    assert_eq!(harness.advisories(), vec!["failed B"]);

    // Next cycle only retries what failed
    harness.destination.clear_failures();
    let retry = harness.cycle(&mut store).await;
    assert_eq!(created_titles(&retry), vec!["B"]);
    assert_eq!(retry.skipped.len(), 2);
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let harness = Harness::new(standup_and_review());
    harness
        .destination
        .fail_writes_for("Review", ProviderError::transient("503"));
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    // The fake fails every attempt, so Review ends up failed after retrying
    assert_eq!(created_titles(&result), vec!["Standup"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].error.kind, ProviderErrorKind::Transient);
}

#[tokio::test]
async fn removed_source_event_is_reported_stale_but_kept() {
    let harness = Harness::new(standup_and_review());
    let mut store = MemoryMappingStore::new();
    harness.cycle(&mut store).await;

    harness
        .source
        .set_events(vec![google("g-x", "Standup", 17, 9, 10)]);
    let result = harness.cycle(&mut store).await;

    assert_eq!(result.stale_advisories.len(), 1);
    assert_eq!(result.stale_advisories[0].event.title, "Review");
    assert!(result.created.is_empty());
    assert_eq!(harness.destination.titles(), vec!["Review", "Standup"]);
    assert_eq!(harness.advisories(), vec!["stale Review"]);
}

#[tokio::test]
async fn auth_expiry_mid_apply_aborts_and_keeps_earlier_mappings() {
    let harness = Harness::new(vec![
        google("g-a", "A", 17, 9, 10),
        google("g-b", "B", 18, 9, 10),
        google("g-c", "C", 19, 9, 10),
    ]);
    harness
        .destination
        .fail_writes_for("B", ProviderError::auth_expired("token revoked"));
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(created_titles(&result), vec!["A"]);
    let abort = result.aborted.as_ref().unwrap();
    assert_eq!(abort.stage, CycleStage::Apply);
    assert_eq!(abort.error.kind, ProviderErrorKind::AuthExpired);
    assert_eq!(abort.skipped_actions, 1);
    assert_eq!(harness.destination.titles(), vec!["A"]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn expired_session_aborts_before_any_provider_call() {
    let mut harness = Harness::new(standup_and_review());
    harness.destination_session.expires_at = Some(Utc::now() - Duration::minutes(1));
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(result.aborted.as_ref().unwrap().stage, CycleStage::Session);
    assert_eq!(harness.source.list_calls.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn flaky_pull_is_retried() {
    let harness = Harness::new(standup_and_review());
    harness.source.fail_next_lists([
        ProviderError::rate_limited("429"),
        ProviderError::transient("502"),
    ]);
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert!(result.is_clean());
    assert_eq!(result.created.len(), 2);
    assert_eq!(harness.source.list_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn pull_failure_after_retries_aborts_without_writing() {
    let harness = Harness::new(standup_and_review());
    harness
        .source
        .fail_next_lists((0..3).map(|_| ProviderError::transient("502")));
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(result.aborted.as_ref().unwrap().stage, CycleStage::Pull);
    assert_eq!(harness.destination.writes(), (0, 0));
}

#[tokio::test]
async fn source_edit_is_pushed_as_update() {
    let harness = Harness::new(standup_and_review());
    let mut store = MemoryMappingStore::new();
    harness.cycle(&mut store).await;

    let mut events = standup_and_review();
    events[1].location = Some("Room 4".to_string());
    events[1].updated = Some((Utc::now() + Duration::hours(1)).to_rfc3339());
    harness.source.set_events(events);

    let result = harness.cycle(&mut store).await;

    assert_eq!(result.updated.len(), 1);
    assert_eq!(result.updated[0].event.title, "Review");
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(harness.destination.writes(), (2, 1));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn identical_destination_event_is_adopted_not_duplicated() {
    let harness = Harness::new(standup_and_review());
    let standup = CanonicalEvent {
        source_id: "manual".to_string(),
        title: "Standup".to_string(),
        start: march(17, 9),
        end: march(17, 10),
        is_all_day: false,
        location: None,
        description: None,
        recurrence_instance_key: None,
        last_modified: None,
    };
    harness.destination.insert("AAMk-manual", &standup);
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(created_titles(&result), vec!["Review"]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(store.len(), 2);
    assert!(
        store
            .read_all()
            .unwrap()
            .iter()
            .any(|m| m.destination_event_id == "AAMk-manual")
    );
}

#[tokio::test]
async fn malformed_source_events_are_rejected_and_skipped() {
    let mut broken = google("g-broken", "Broken", 18, 9, 10);
    broken.end = None;
    let mut events = standup_and_review();
    events.push(broken);
    let harness = Harness::new(events);
    let mut store = MemoryMappingStore::new();

    let result = harness.cycle(&mut store).await;

    assert_eq!(result.created.len(), 2);
    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.rejected[0].source_id, "g-broken");
    assert!(harness.advisories().contains(&"rejected g-broken".to_string()));
}

#[tokio::test]
async fn recurring_series_is_copied_per_instance() {
    let series = GoogleEvent {
        id: "g-weekly".to_string(),
        summary: Some("Weekly sync".to_string()),
        start: google_time(march(3, 9)),
        end: google_time(march(3, 10)),
        recurrence: vec!["RRULE:FREQ=WEEKLY;COUNT=10".to_string()],
        updated: Some("2025-02-20T12:00:00Z".to_string()),
        ..Default::default()
    };
    let harness = Harness::new(vec![series]);
    let mut store = MemoryMappingStore::new();

    let mut context = harness.context();
    context.window = SyncWindow::new(march(1, 0), march(22, 0)).unwrap();

    let first = run_cycle(&context, &mut store).await.unwrap();
    assert_eq!(first.created.len(), 3);
    let keys: Vec<_> = first
        .created
        .iter()
        .filter_map(|a| a.event.recurrence_instance_key.clone())
        .collect();
    assert_eq!(
        keys,
        vec!["20250303T090000Z", "20250310T090000Z", "20250317T090000Z"]
    );

    let second = run_cycle(&context, &mut store).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped.len(), 3);
}

#[tokio::test]
async fn preview_does_not_write() {
    let harness = Harness::new(standup_and_review());
    let store = MemoryMappingStore::new();

    let preview = preview_cycle(&harness.context(), &store).await.unwrap();

    assert_eq!(preview.plan.counts(), (2, 0, 0));
    assert_eq!(harness.destination.writes(), (0, 0));
    assert!(store.is_empty());
}

#[tokio::test]
async fn file_store_carries_mappings_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("google--outlook.json");
    let harness = Harness::new(standup_and_review());

    {
        let mut store = FileMappingStore::open(&path).unwrap();
        let result = harness.cycle(&mut store).await;
        assert_eq!(result.created.len(), 2);
    }

    let mut store = FileMappingStore::open(&path).unwrap();
    assert_eq!(store.read_all().unwrap().len(), 2);
    let result = harness.cycle(&mut store).await;
    assert!(result.created.is_empty());
    assert_eq!(result.skipped.len(), 2);
}

fn manual(id: &str, title: &str, day: u32, hour: u32) -> CanonicalEvent {
    CanonicalEvent {
        source_id: id.to_string(),
        title: title.to_string(),
        start: march(day, hour),
        end: march(day, hour + 1),
        is_all_day: false,
        location: None,
        description: None,
        recurrence_instance_key: None,
        last_modified: None,
    }
}

#[tokio::test]
async fn copied_events_are_not_copied_back() {
    let harness = Harness::new(standup_and_review());
    let mut forward = MemoryMappingStore::new();
    harness.cycle(&mut forward).await;

    // The originals, as the reverse direction sees them
    let originals = FakeOutlook::default();
    originals.insert("orig-x", &manual("orig-x", "Standup", 17, 9));
    originals.insert("orig-y", &manual("orig-y", "Review", 19, 14));

    let context = harness.reverse_context(&originals, forward.destination_event_ids().unwrap());
    let mut backward = MemoryMappingStore::new();
    let result = run_cycle(&context, &mut backward).await.unwrap();

    assert!(result.created.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(originals.writes(), (0, 0));
    assert!(backward.is_empty());
}

#[tokio::test]
async fn copy_of_deleted_original_is_not_brought_back() {
    let harness = Harness::new(standup_and_review());
    let mut forward = MemoryMappingStore::new();
    harness.cycle(&mut forward).await;

    // Review is deleted on the source; its copy stays behind
    harness
        .source
        .set_events(vec![google("g-x", "Standup", 17, 9, 10)]);
    let result = harness.cycle(&mut forward).await;
    assert_eq!(result.stale_advisories.len(), 1);

    // Lunch was added on the destination side by hand
    harness.destination.insert("AAMk-lunch", &manual("lunch", "Lunch", 18, 12));

    let originals = FakeOutlook::default();
    originals.insert("orig-x", &manual("orig-x", "Standup", 17, 9));

    let context = harness.reverse_context(&originals, forward.destination_event_ids().unwrap());
    let mut backward = MemoryMappingStore::new();
    let result = run_cycle(&context, &mut backward).await.unwrap();

    assert_eq!(created_titles(&result), vec!["Lunch"]);
    assert_eq!(originals.titles(), vec!["Lunch", "Standup"]);
    assert_eq!(backward.len(), 1);
}

#[tokio::test]
async fn touched_source_refreshes_mapping_so_destination_edits_survive() {
    let harness = Harness::new(standup_and_review());
    let mut store = MemoryMappingStore::new();
    harness.cycle(&mut store).await;

    // Saved again on the source without any real change
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let touched = Utc::now();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut events = standup_and_review();
    for event in &mut events {
        event.updated = Some(touched.to_rfc3339());
    }
    harness.source.set_events(events);

    let second = harness.cycle(&mut store).await;
    assert!(second.updated.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert!(
        store
            .read_all()
            .unwrap()
            .iter()
            .all(|m| m.last_synced > touched)
    );

    // A local edit on the copy, with the source left alone
    harness.destination.set_location("Review", "Room 9");
    let third = harness.cycle(&mut store).await;

    assert!(third.updated.is_empty());
    assert_eq!(third.skipped.len(), 2);
    assert_eq!(harness.destination.writes(), (2, 0));
}
