//! Matching source events against destination events by fingerprint.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::event::CanonicalEvent;
use crate::fingerprint::{SyncFingerprint, compute_fingerprint};
use crate::store::DestinationMapping;

/// A source event paired with the destination event representing it.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub fingerprint: SyncFingerprint,
    pub source: CanonicalEvent,
    pub destination: CanonicalEvent,
    /// Present when the pairing is already recorded in the mapping store
    pub mapping: Option<DestinationMapping>,
}

/// A source event with no destination counterpart yet.
#[derive(Debug, Clone)]
pub struct UnmatchedSource {
    pub fingerprint: SyncFingerprint,
    pub event: CanonicalEvent,
}

/// A previously synced destination event whose source is gone.
#[derive(Debug, Clone, Serialize)]
pub struct StaleDestination {
    /// Fingerprint the destination event was mapped under
    pub fingerprint: SyncFingerprint,
    pub destination_event_id: String,
    pub event: CanonicalEvent,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedPair>,
    pub unmatched_source: Vec<UnmatchedSource>,
    pub stale_destination: Vec<StaleDestination>,
}

/// Pair up source and destination events.
///
/// Candidates for a fingerprint come from two places: destination events the
/// mapping store already links to it (checked first, so a destination event
/// edited by hand is still recognised), and destination events whose fresh
/// fingerprint equals it (recovers lost mappings and picks up identical
/// manually-created events). Each destination event is claimed at most once;
/// identical source events each need their own destination event.
pub fn match_events(
    source_events: Vec<CanonicalEvent>,
    destination_events: Vec<CanonicalEvent>,
    known_mappings: &[DestinationMapping],
) -> MatchOutcome {
    let destination_by_id: HashMap<&str, &CanonicalEvent> = destination_events
        .iter()
        .map(|e| (e.source_id.as_str(), e))
        .collect();

    // Mappings whose destination event is still there, by fingerprint
    let mut mapped: HashMap<&SyncFingerprint, Vec<&DestinationMapping>> = HashMap::new();
    let mut mapping_by_destination: HashMap<&str, &DestinationMapping> = HashMap::new();
    for mapping in known_mappings {
        if destination_by_id.contains_key(mapping.destination_event_id.as_str()) {
            mapped.entry(&mapping.fingerprint).or_default().push(mapping);
            mapping_by_destination
                .entry(mapping.destination_event_id.as_str())
                .or_insert(mapping);
        }
    }

    // Fresh scan: destination events by their current fingerprint
    let mut scanned: HashMap<SyncFingerprint, Vec<&str>> = HashMap::new();
    for event in &destination_events {
        scanned
            .entry(compute_fingerprint(event))
            .or_default()
            .push(event.source_id.as_str());
    }

    let mut candidates: HashMap<SyncFingerprint, VecDeque<(&str, Option<&DestinationMapping>)>> =
        HashMap::new();
    let source_fingerprints: Vec<SyncFingerprint> =
        source_events.iter().map(compute_fingerprint).collect();

    for fingerprint in &source_fingerprints {
        if candidates.contains_key(fingerprint) {
            continue;
        }

        let mut queue = VecDeque::new();
        let mut by_mapping = mapped.get(fingerprint).cloned().unwrap_or_default();
        by_mapping.sort_by(|a, b| a.destination_event_id.cmp(&b.destination_event_id));
        for mapping in by_mapping {
            queue.push_back((mapping.destination_event_id.as_str(), Some(mapping)));
        }
        if let Some(ids) = scanned.get(fingerprint) {
            let mut ids = ids.clone();
            ids.sort();
            for id in ids {
                let mapping = mapping_by_destination
                    .get(id)
                    .copied()
                    .filter(|m| &m.fingerprint == fingerprint);
                queue.push_back((id, mapping));
            }
        }
        candidates.insert(fingerprint.clone(), queue);
    }

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut outcome = MatchOutcome::default();

    for (event, fingerprint) in source_events.iter().zip(source_fingerprints) {
        let hit = candidates.get_mut(&fingerprint).and_then(|queue| {
            while let Some((id, mapping)) = queue.pop_front() {
                if claimed.insert(id) {
                    return Some((id, mapping));
                }
            }
            None
        });

        match hit {
            Some((id, mapping)) => outcome.matched.push(MatchedPair {
                fingerprint,
                source: event.clone(),
                destination: destination_by_id[id].clone(),
                mapping: mapping.cloned(),
            }),
            None => outcome.unmatched_source.push(UnmatchedSource {
                fingerprint,
                event: event.clone(),
            }),
        }
    }

    // Mapped destination events nobody claimed: their source went away
    for event in &destination_events {
        let id = event.source_id.as_str();
        if claimed.contains(id) {
            continue;
        }
        if let Some(mapping) = mapping_by_destination.get(id) {
            outcome.stale_destination.push(StaleDestination {
                fingerprint: mapping.fingerprint.clone(),
                destination_event_id: id.to_string(),
                event: event.clone(),
            });
        }
    }

    outcome
}
