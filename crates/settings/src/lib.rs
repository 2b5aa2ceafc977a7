//! TunnelGate Settings
//!
//! Runtime configuration for the relay.
//!
//! - Listener and limits: JSON file (optional) with environment overrides
//! - Shared secret and salt: environment only (`SECRET`, `SALT`)
//!
//! ## Usage
//!
//! ```no_run
//! use tunnelgate_settings::{Secrets, Settings};
//!
//! let settings = Settings::load(None)?;
//! let codec = Secrets::from_env()?.into_codec();
//! # Ok::<(), tunnelgate_settings::SettingsError>(())
//! ```

mod config;
mod secrets;

pub use config::{Settings, LISTEN_ADDR_ENV, PORT_ENV};
pub use secrets::Secrets;

use thiserror::Error;
use tunnelgate_crypto::DecodeError;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing environment variable {0}")]
    MissingSecret(&'static str),

    #[error("Invalid secret: {0}")]
    InvalidSecret(DecodeError),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
