use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{CalSyncError, CalSyncResult};
use crate::store::{DestinationMapping, MappingStore, upsert_into};

const STORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    mappings: Vec<DestinationMapping>,
}

/// JSON-file mapping store.
///
/// Opening the store takes an exclusive lock on `<path>.lock`, held until
/// the store is dropped, so two cycles can never write the same destination
/// calendar's mappings at once. Every upsert is written through atomically
/// (temp file + rename) so mappings of already-applied actions survive an
/// aborted cycle.
pub struct FileMappingStore {
    path: PathBuf,
    mappings: Vec<DestinationMapping>,
    _lock: File,
}

impl FileMappingStore {
    pub fn open(path: &Path) -> CalSyncResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = lock_path_for(path);
        let lock = File::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| CalSyncError::LeaseHeld(path.display().to_string()))?;

        let mappings = if path.exists() {
            let content = fs::read_to_string(path)?;
            let file: StoreFile = serde_json::from_str(&content).map_err(|e| {
                CalSyncError::Store(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            if file.version != STORE_VERSION {
                return Err(CalSyncError::Store(format!(
                    "{} has unsupported version {}",
                    path.display(),
                    file.version
                )));
            }
            file.mappings
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), mappings = mappings.len(), "opened mapping store");

        Ok(FileMappingStore {
            path: path.to_path_buf(),
            mappings,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> CalSyncResult<()> {
        let content = serde_json::to_string_pretty(&StoreFile {
            version: STORE_VERSION,
            mappings: self.mappings.clone(),
        })
        .map_err(|e| CalSyncError::Serialization(e.to_string()))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl MappingStore for FileMappingStore {
    fn read_all(&self) -> CalSyncResult<Vec<DestinationMapping>> {
        Ok(self.mappings.clone())
    }

    fn upsert(&mut self, mapping: DestinationMapping) -> CalSyncResult<()> {
        upsert_into(&mut self.mappings, mapping);
        self.save()
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_os_string();
    lock.push(".lock");
    PathBuf::from(lock)
}
