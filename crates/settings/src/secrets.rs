//! Shared secret and salt, read once at startup

use tracing::warn;
use tunnelgate_core::{SALT_ENV, SECRET_ENV};
use tunnelgate_crypto::{Salt, SharedSecret, TokenCodec};

use crate::{Result, SettingsError};

/// Key material every token is checked against
#[derive(Debug, Clone)]
pub struct Secrets {
    pub secret: SharedSecret,
    pub salt: Salt,
}

impl Secrets {
    /// Read `SECRET` and `SALT` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(SECRET_ENV).ok_or(SettingsError::MissingSecret(SECRET_ENV))?;
        let secret = SharedSecret::new(secret.into_bytes()).map_err(SettingsError::InvalidSecret)?;

        let salt = Salt::new(lookup(SALT_ENV).unwrap_or_default().into_bytes());
        if salt.is_empty() {
            warn!("{} is empty: tokens are accepted without an integrity check", SALT_ENV);
        }

        Ok(Self { secret, salt })
    }

    pub fn into_codec(self) -> TokenCodec {
        TokenCodec::new(self.secret, self.salt)
    }
}
