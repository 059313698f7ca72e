//! Configuration for the scroll odometer.

use crate::clock::{SharedClock, SystemClock};
use crate::collector::types::{TEST_APP, UNKNOWN_APP};
use crate::core::extractor::ExtractorConfig;
use crate::error::{ConfigError, LedgerError};
use crate::ledger::{FileStore, Ledger, LedgerKeys, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main configuration for the odometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the ledger and transparency files
    pub data_path: PathBuf,

    /// Prefix for every persisted ledger key
    pub key_namespace: String,

    /// IANA timezone for day boundaries; local time when unset
    pub timezone: Option<String>,

    /// Extraction constants
    pub extraction: ExtractorConfig,

    /// App ids that never receive per-app credit
    pub excluded_app_ids: Vec<String>,

    /// Presentation gateway to forward samples to
    pub gateway: Option<GatewaySettings>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scroll-odometer");

        Self {
            data_path: data_dir,
            key_namespace: DEFAULT_NAMESPACE.to_string(),
            timezone: None,
            extraction: ExtractorConfig::default(),
            excluded_app_ids: vec![UNKNOWN_APP.to_string(), TEST_APP.to_string()],
            gateway: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scroll-odometer")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join("ledger.json")
    }

    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    /// Clock honoring the configured timezone.
    pub fn clock(&self) -> SharedClock {
        Arc::new(SystemClock::with_timezone(self.timezone.as_deref()))
    }

    pub fn ledger_keys(&self) -> LedgerKeys {
        LedgerKeys::new(self.key_namespace.clone())
    }

    /// Open the durable ledger described by this configuration.
    pub fn open_ledger(&self, clock: SharedClock) -> Result<Ledger, LedgerError> {
        let store = FileStore::open(self.ledger_path())?;
        Ok(Ledger::new(store, clock)
            .with_keys(self.ledger_keys())
            .with_excluded_apps(self.excluded_app_ids.iter().cloned()))
    }
}

/// Where the presentation gateway listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    pub port: u16,
    pub token: String,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}
