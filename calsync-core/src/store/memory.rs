use crate::error::CalSyncResult;
use crate::store::{DestinationMapping, MappingStore, upsert_into};

/// Non-durable store, used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryMappingStore {
    mappings: Vec<DestinationMapping>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(mappings: Vec<DestinationMapping>) -> Self {
        let mut store = Self::new();
        for mapping in mappings {
            upsert_into(&mut store.mappings, mapping);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl MappingStore for MemoryMappingStore {
    fn read_all(&self) -> CalSyncResult<Vec<DestinationMapping>> {
        Ok(self.mappings.clone())
    }

    fn upsert(&mut self, mapping: DestinationMapping) -> CalSyncResult<()> {
        upsert_into(&mut self.mappings, mapping);
        Ok(())
    }
}
