//! Provider subprocess adapter.
//!
//! Each call spawns `calsync-provider-<name>`, writes one JSON request line
//! to its stdin and reads one JSON response from its stdout. Providers own
//! their credentials and API specifics; calsync only forwards the session
//! and the provider-specific settings from the config file.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::error::ProviderError;
use crate::event::CanonicalEvent;
use crate::provider::protocol::{
    Command, CreateEvent, ListEvents, OpenSession, ProviderCommand, Request, Response, UpdateEvent,
};
use crate::provider::{EventSink, EventSource, Session};
use crate::raw::RawEvent;
use crate::window::SyncWindow;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
/// Session acquisition may wait on a browser login or a second factor.
const SESSION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ProcessProvider {
    name: String,
    remote_config: serde_json::Map<String, serde_json::Value>,
}

impl ProcessProvider {
    pub fn new(name: &str, remote_config: serde_json::Map<String, serde_json::Value>) -> Self {
        ProcessProvider {
            name: name.to_string(),
            remote_config,
        }
    }

    pub fn binary_name(&self) -> String {
        format!("calsync-provider-{}", self.name)
    }

    fn binary_path(&self) -> Result<std::path::PathBuf, ProviderError> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| {
            ProviderError::rejected(format!(
                "Provider '{}' not found. Install `{}` somewhere in PATH",
                self.name, binary_name
            ))
        })
    }

    /// Acquire a session before a cycle starts.
    pub async fn open_session(&self, account: &str) -> Result<Session, ProviderError> {
        self.call_with_timeout(
            SESSION_TIMEOUT,
            OpenSession {
                remote_config: self.remote_config.clone(),
                account: account.to_string(),
            },
        )
        .await
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> Result<C::Response, ProviderError> {
        self.call_with_timeout(PROVIDER_TIMEOUT, cmd).await
    }

    async fn call_with_timeout<C: ProviderCommand>(
        &self,
        limit: Duration,
        cmd: C,
    ) -> Result<C::Response, ProviderError> {
        timeout(limit, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                ProviderError::transient(format!(
                    "{} timed out after {}s",
                    self.binary_name(),
                    limit.as_secs()
                ))
            })?
    }

    /// Low-level call that sends a command with params and deserializes the response.
    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> Result<R, ProviderError> {
        let params = serde_json::to_value(params)
            .map_err(|e| ProviderError::rejected(format!("Failed to encode request: {e}")))?;
        let request_json = serde_json::to_string(&Request { command, params })
            .map_err(|e| ProviderError::rejected(format!("Failed to encode request: {e}")))?;

        let binary_path = self.binary_path()?;
        tracing::debug!(provider = %self.name, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::transient(format!(
                    "Failed to spawn {}: {}",
                    binary_path.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::transient("Provider stdin unavailable"))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(|e| ProviderError::transient(format!("Failed to write request: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::transient(format!("Failed to read response: {e}")))?;

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(ProviderError::transient(format!(
                "Provider exited with status {} and no response",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| ProviderError::rejected(format!("Failed to parse response: {e}")))?;

        response.into_result()
    }
}

#[async_trait]
impl EventSource for ProcessProvider {
    async fn list_events(
        &self,
        session: &Session,
        window: &SyncWindow,
    ) -> Result<Vec<RawEvent>, ProviderError> {
        self.call(ListEvents {
            remote_config: self.remote_config.clone(),
            session: session.clone(),
            from: window.start_rfc3339(),
            to: window.end_rfc3339(),
        })
        .await
    }
}

#[async_trait]
impl EventSink for ProcessProvider {
    async fn create_event(
        &self,
        session: &Session,
        event: &CanonicalEvent,
    ) -> Result<String, ProviderError> {
        self.call(CreateEvent {
            remote_config: self.remote_config.clone(),
            session: session.clone(),
            event: event.clone(),
        })
        .await
    }

    async fn update_event(
        &self,
        session: &Session,
        destination_event_id: &str,
        event: &CanonicalEvent,
    ) -> Result<(), ProviderError> {
        self.call(UpdateEvent {
            remote_config: self.remote_config.clone(),
            session: session.clone(),
            event_id: destination_event_id.to_string(),
            event: event.clone(),
        })
        .await
    }
}
