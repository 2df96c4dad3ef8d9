//! Content-derived event identity.
//!
//! The two providers share no id space, so events are joined on a digest of
//! the fields that make an event "the same event": title, start, end,
//! all-day flag and recurrence instance key.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::event::CanonicalEvent;

/// Lowercase hex SHA-256 over the identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncFingerprint(String);

impl SyncFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for logs
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for SyncFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SyncFingerprint {
    fn from(value: String) -> Self {
        SyncFingerprint(value)
    }
}

/// Bumped whenever the encoding below changes, so old digests never collide
/// with new ones.
const FINGERPRINT_VERSION: &[u8] = b"calsync-fp-v1";

/// Compute the fingerprint of an event.
///
/// Every field is written with a tag and a length prefix, so distinct field
/// tuples never produce the same byte stream ("ab" + "c" vs "a" + "bc").
/// Instants are encoded as UTC seconds, which makes the digest independent
/// of the zone the provider reported.
pub fn compute_fingerprint(event: &CanonicalEvent) -> SyncFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_VERSION);

    write_field(&mut hasher, b'T', event.title.as_bytes());
    write_field(&mut hasher, b'S', &event.start.timestamp().to_be_bytes());
    write_field(&mut hasher, b'E', &event.end.timestamp().to_be_bytes());
    write_field(&mut hasher, b'A', &[u8::from(event.is_all_day)]);
    match &event.recurrence_instance_key {
        Some(key) => write_field(&mut hasher, b'R', key.as_bytes()),
        None => write_field(&mut hasher, b'r', &[]),
    }

    SyncFingerprint(hex::encode(hasher.finalize()))
}

fn write_field(hasher: &mut Sha256, tag: u8, bytes: &[u8]) {
    hasher.update([tag]);
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
