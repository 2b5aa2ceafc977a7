//! TunnelGate Cryptography
//!
//! Token codec: turns the base64 header line a client sends into the backend
//! address it names, and issues such tokens for a given address.
//!
//! Token layout: `base64(IV || AES-CFB(key, IV, address || salt))`.

mod codec;
mod keys;

pub use codec::*;
pub use keys::*;
