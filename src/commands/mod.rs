pub mod auth;
pub mod config;
pub mod status;
pub mod sync;

use std::collections::HashSet;

use anyhow::Result;
use calsync_core::config::{CalsyncConfig, EndpointConfig};
use calsync_core::provider::Session;
use calsync_core::store::{FileMappingStore, MappingStore};

use crate::render::Render;
use crate::utils::tui;

/// Acquire a session for one side. May block on an interactive login.
pub async fn open_session(endpoint: &EndpointConfig) -> Result<Session> {
    let spinner = tui::create_spinner(format!("{} signing in", endpoint.render()));
    let result = endpoint.provider().open_session(&endpoint.account).await;
    spinner.finish_and_clear();

    Ok(result?)
}

/// Ids of the events the `to` → `from` direction wrote into `from`.
///
/// Copying `from` into `to` leaves these out, so a copy never travels back
/// to the calendar its original came from.
pub fn own_copies(
    config: &CalsyncConfig,
    from: &EndpointConfig,
    to: &EndpointConfig,
) -> Result<HashSet<String>> {
    let path = config.store_path(to, from);
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let store = FileMappingStore::open(&path)?;
    Ok(store.destination_event_ids()?)
}
