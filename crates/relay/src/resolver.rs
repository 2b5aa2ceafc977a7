//! Read-through token resolution

use std::sync::Arc;

use tracing::debug;
use tunnelgate_core::{DestinationAddress, WireToken};
use tunnelgate_crypto::{DecodeError, TokenDecoder};

use crate::AddressCache;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: DestinationAddress,
    /// Served from the cache without decoding
    pub cached: bool,
}

/// Cache in front of a token decoder.
///
/// Cheap to clone; clones share the same cache and decoder.
#[derive(Clone)]
pub struct Resolver {
    cache: Arc<AddressCache>,
    decoder: Arc<dyn TokenDecoder>,
}

impl Resolver {
    pub fn new(cache: Arc<AddressCache>, decoder: Arc<dyn TokenDecoder>) -> Self {
        Self { cache, decoder }
    }

    /// Resolve a token, decoding only on a cache miss.
    ///
    /// Tokens that fail to decode are never cached.
    pub fn resolve(&self, token: &WireToken) -> Result<Resolution, DecodeError> {
        if let Some(address) = self.cache.lookup(token.as_bytes()) {
            return Ok(Resolution {
                address,
                cached: true,
            });
        }

        let address = self.decoder.decode(token.as_bytes())?;
        self.cache.insert(token.clone(), address.clone());
        debug!(
            "Cached token {} -> {} ({} entries)",
            token.fingerprint(),
            address,
            self.cache.len()
        );

        Ok(Resolution {
            address,
            cached: false,
        })
    }

    pub fn cache(&self) -> &Arc<AddressCache> {
        &self.cache
    }
}
