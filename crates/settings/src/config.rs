//! Configuration types

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use tunnelgate_core::{
    DEFAULT_MAX_CACHE_ENTRIES, DEFAULT_MAX_HEADER_LEN, DEFAULT_MAX_OPEN_FILES, DEFAULT_PORT,
};

use crate::{Result, SettingsError};

/// Overrides `listen_addr` entirely
pub const LISTEN_ADDR_ENV: &str = "TUNNELGATE_LISTEN_ADDR";

/// Overrides only the port of `listen_addr`
pub const PORT_ENV: &str = "TUNNELGATE_PORT";

/// Relay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Address the relay accepts tunnels on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Cached tokens before the address cache starts over
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Longest accepted header line, terminator included
    #[serde(default = "default_max_header_len")]
    pub max_header_len: usize,

    /// Give up on clients that do not send a header in time (unset = wait forever)
    #[serde(default)]
    pub header_timeout_secs: Option<u64>,

    /// Give up on backends that do not accept in time (unset = OS default)
    #[serde(default)]
    pub dial_timeout_secs: Option<u64>,

    /// Open-file limit requested at startup
    #[serde(default = "default_max_open_files")]
    pub max_open_files: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

fn default_max_cache_entries() -> usize {
    DEFAULT_MAX_CACHE_ENTRIES
}

fn default_max_header_len() -> usize {
    DEFAULT_MAX_HEADER_LEN
}

fn default_max_open_files() -> u64 {
    DEFAULT_MAX_OPEN_FILES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_cache_entries: default_max_cache_entries(),
            max_header_len: default_max_header_len(),
            header_timeout_secs: None,
            dial_timeout_secs: None,
            max_open_files: default_max_open_files(),
        }
    }
}

impl Settings {
    /// Load from `path` if given (defaults otherwise), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        settings.apply_env_with(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific path, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Apply `TUNNELGATE_LISTEN_ADDR` then `TUNNELGATE_PORT` from `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(LISTEN_ADDR_ENV) {
            self.listen_addr = value.parse().map_err(|_| SettingsError::InvalidValue {
                key: LISTEN_ADDR_ENV,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(PORT_ENV) {
            let port: u16 = value.parse().map_err(|_| SettingsError::InvalidValue {
                key: PORT_ENV,
                value: value.clone(),
            })?;
            self.listen_addr.set_port(port);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_header_len == 0 {
            return Err(SettingsError::InvalidValue {
                key: "max_header_len",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn header_timeout(&self) -> Option<Duration> {
        self.header_timeout_secs.map(Duration::from_secs)
    }

    pub fn dial_timeout(&self) -> Option<Duration> {
        self.dial_timeout_secs.map(Duration::from_secs)
    }
}
