//! Application configuration management.
//!
//! Two layers:
//! - `Config`: user preferences stored at `~/.config/drivedeck/config.json`
//!   (storage backend, timeouts, optional scope/discovery overrides)
//! - `ProviderConfig`: API key and OAuth client credentials, read from the
//!   environment once at startup and never changed afterwards

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "drivedeck";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_KEY_VAR: &str = "DRIVEDECK_API_KEY";
pub const CLIENT_ID_VAR: &str = "DRIVEDECK_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "DRIVEDECK_CLIENT_SECRET";

/// OAuth scopes requested at sign-in
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.metadata",
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Discovery documents for the APIs the client talks to
pub const DEFAULT_DISCOVERY_DOCS: &[&str] = &[
    "https://www.googleapis.com/discovery/v1/apis/drive/v3/rest",
    "https://www.googleapis.com/discovery/v1/apis/people/v1/rest",
];

/// How long to wait for the user to finish signing in.
/// Five minutes covers account selection and 2FA without hanging forever.
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;

/// How long to wait for both provider components to initialize.
const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `access_token.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Nothing persisted across runs
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!(
                "Unknown storage backend '{}' (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageBackend,
    pub login_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub scopes: Option<Vec<String>>,
    pub discovery_docs: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            scopes: None,
            discovery_docs: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("logs"))
    }

    /// Build the configured session storage backend
    pub fn session_storage(&self) -> Result<Arc<dyn SessionStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}

/// Credentials and API selection for the Google provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub discovery_docs: Vec<String>,
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; empty values count as unset
    pub fn from_lookup<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).ok_or_else(|| anyhow!("{} is not set", name));

        let owned = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

        Ok(Self {
            api_key: require(API_KEY_VAR)?,
            client_id: require(CLIENT_ID_VAR)?,
            client_secret: get(CLIENT_SECRET_VAR),
            discovery_docs: config
                .discovery_docs
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_DISCOVERY_DOCS)),
            scopes: config.scopes.clone().unwrap_or_else(|| owned(DEFAULT_SCOPES)),
        })
    }
}
