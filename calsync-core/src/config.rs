//! Global calsync configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_WINDOW_FUTURE_DAYS, DEFAULT_WINDOW_PAST_DAYS};
use crate::error::{CalSyncError, CalSyncResult};
use crate::provider::ProcessProvider;
use crate::window::SyncWindow;

static DEFAULT_STATE_DIR: &str = "~/.local/share/calsync";

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_past_days() -> i64 {
    DEFAULT_WINDOW_PAST_DAYS
}

fn default_future_days() -> i64 {
    DEFAULT_WINDOW_FUTURE_DAYS
}

/// One side of the sync: which provider binary to talk to and for which account.
///
/// Any other keys in the table (calendar_id and the like) are passed
/// through to the provider untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EndpointConfig {
    pub provider: String,
    pub account: String,
    #[serde(flatten)]
    pub params: HashMap<String, toml::Value>,
}

impl EndpointConfig {
    /// Provider-specific settings as JSON, for the provider protocol.
    pub fn remote_config(&self) -> serde_json::Map<String, serde_json::Value> {
        self.params
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }

    pub fn provider(&self) -> ProcessProvider {
        ProcessProvider::new(&self.provider, self.remote_config())
    }

    /// Stable, filesystem-safe name, e.g. "google-me-gmail-com".
    pub fn slug(&self) -> String {
        slug::slugify(format!("{} {}", self.provider, self.account))
    }
}

impl std::fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.account)
    }
}

/// Configuration at ~/.config/calsync/config.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalsyncConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_past_days")]
    pub window_past_days: i64,

    #[serde(default = "default_future_days")]
    pub window_future_days: i64,

    /// Also copy destination events back to the source
    #[serde(default)]
    pub bidirectional: bool,

    pub source: Option<EndpointConfig>,
    pub destination: Option<EndpointConfig>,
}

impl CalsyncConfig {
    pub fn config_path() -> CalSyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine config directory".into()))?
            .join("calsync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, writing a commented default on first run.
    pub fn load() -> CalSyncResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> CalSyncResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .build()
            .map_err(|e| CalSyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalSyncError::Config(e.to_string()))
    }

    /// Create a default config file with everything commented out.
    pub fn create_default_config(path: &Path) -> CalSyncResult<()> {
        let contents = format!(
            "\
# calsync configuration

# Where mapping stores are kept:
# state_dir = \"{DEFAULT_STATE_DIR}\"

# Sync window, in days around today:
# window_past_days = {DEFAULT_WINDOW_PAST_DAYS}
# window_future_days = {DEFAULT_WINDOW_FUTURE_DAYS}

# Also copy destination events back to the source:
# bidirectional = false

# [source]
# provider = \"google\"
# account = \"me@gmail.com\"
# calendar_id = \"primary\"

# [destination]
# provider = \"outlook\"
# account = \"me@corp.example\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalSyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalSyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn source(&self) -> CalSyncResult<&EndpointConfig> {
        self.source
            .as_ref()
            .ok_or_else(|| CalSyncError::Config("No [source] configured".into()))
    }

    pub fn destination(&self) -> CalSyncResult<&EndpointConfig> {
        self.destination
            .as_ref()
            .ok_or_else(|| CalSyncError::Config("No [destination] configured".into()))
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_dir.to_string_lossy()).into_owned())
    }

    /// Mapping store for copying `from` into `to`. Each direction has its own.
    pub fn store_path(&self, from: &EndpointConfig, to: &EndpointConfig) -> PathBuf {
        self.state_path()
            .join(format!("{}--{}.json", from.slug(), to.slug()))
    }

    /// Window from CLI bounds, falling back to the configured day counts.
    pub fn window(&self, from: Option<&str>, to: Option<&str>) -> CalSyncResult<SyncWindow> {
        SyncWindow::from_args(from, to, self.window_past_days, self.window_future_days)
    }
}
