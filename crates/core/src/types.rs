use std::borrow::Borrow;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::{AddressError, Result};

/// Header line received from a client, line terminator stripped.
///
/// Opaque until decoded; only ever used as a cache key or fed to the codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireToken(Vec<u8>);

impl WireToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short, non-reversible identifier for log lines
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        hex::encode(&digest[..6])
    }
}

impl Borrow<[u8]> for WireToken {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for WireToken {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for WireToken {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

/// Backend a token resolves to, in `host:port` form.
///
/// IPv6 literals use the bracketed form (`[::1]:8080`). The original string is
/// kept verbatim so it can be handed to the resolver unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationAddress {
    raw: String,
    port: u16,
}

impl DestinationAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        if raw.contains(['\n', '\r']) {
            return Err(AddressError::LineBreak);
        }

        let (host, port) = split_host_port(raw)?;
        if host.is_empty() {
            return Err(AddressError::Empty);
        }
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            port,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for DestinationAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_host_port(target: &str) -> Result<(&str, &str)> {
    if let Some(rest) = target.strip_prefix('[') {
        let Some((host, rest)) = rest.split_once(']') else {
            return Err(AddressError::UnclosedBracket);
        };
        let Some(port) = rest.strip_prefix(':') else {
            return Err(AddressError::MissingPort);
        };
        return Ok((host, port));
    }

    target.rsplit_once(':').ok_or(AddressError::MissingPort)
}
