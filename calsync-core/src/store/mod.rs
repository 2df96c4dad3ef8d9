//! Persistence of fingerprint → destination event mappings across cycles.

mod file;
mod memory;

pub use file::FileMappingStore;
pub use memory::MemoryMappingStore;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalSyncResult;
use crate::fingerprint::SyncFingerprint;

/// Records that a destination event was created (or adopted) for a fingerprint.
///
/// `(fingerprint, destination_event_id)` is unique; several mappings may
/// share a fingerprint when the source holds intentional duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationMapping {
    pub fingerprint: SyncFingerprint,
    pub destination_event_id: String,
    pub last_synced: DateTime<Utc>,
}

impl DestinationMapping {
    pub fn new(
        fingerprint: SyncFingerprint,
        destination_event_id: impl Into<String>,
        last_synced: DateTime<Utc>,
    ) -> Self {
        DestinationMapping {
            fingerprint,
            destination_event_id: destination_event_id.into(),
            last_synced,
        }
    }

    fn same_key(&self, other: &DestinationMapping) -> bool {
        self.fingerprint == other.fingerprint
            && self.destination_event_id == other.destination_event_id
    }
}

/// Durable mapping storage. Holding a `&mut` store is the cycle's lease.
pub trait MappingStore {
    fn read_all(&self) -> CalSyncResult<Vec<DestinationMapping>>;

    /// Insert or refresh a mapping. Must be visible to `read_all` right away.
    fn upsert(&mut self, mapping: DestinationMapping) -> CalSyncResult<()>;

    /// Ids of every destination event this store has a mapping for.
    fn destination_event_ids(&self) -> CalSyncResult<HashSet<String>> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|m| m.destination_event_id)
            .collect())
    }
}

/// Insert or replace `mapping` in `mappings`, keeping the list sorted so the
/// persisted form is deterministic.
pub(crate) fn upsert_into(mappings: &mut Vec<DestinationMapping>, mapping: DestinationMapping) {
    match mappings.iter_mut().find(|m| m.same_key(&mapping)) {
        Some(existing) => *existing = mapping,
        None => mappings.push(mapping),
    }
    mappings.sort_by(|a, b| {
        a.fingerprint
            .cmp(&b.fingerprint)
            .then_with(|| a.destination_event_id.cmp(&b.destination_event_id))
    });
}
