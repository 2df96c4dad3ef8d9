//! Synchronization engine behind calsync.
//!
//! A cycle pulls native events from a source and a destination calendar,
//! normalizes them into [`CanonicalEvent`]s, pairs them up by content
//! fingerprint, plans creates and updates, and applies the plan to the
//! destination while recording which destination event stands for which
//! source event.

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod matcher;
pub mod normalize;
pub mod plan;
pub mod provider;
pub mod raw;
pub mod retry;
pub mod store;
pub mod sync;
pub mod window;

pub use error::{CalSyncError, CalSyncResult, MalformedEventError, ProviderError, ProviderErrorKind};
pub use event::CanonicalEvent;
pub use fingerprint::{SyncFingerprint, compute_fingerprint};
pub use window::SyncWindow;
