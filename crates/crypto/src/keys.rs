use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::generic_array::GenericArray;
use cfb_mode::cipher::Key;

use crate::DecodeError;

/// AES block size, and therefore the IV length carried by every token
pub const BLOCK_SIZE: usize = 16;

/// Key material sized for exactly one AES variant
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum CipherKey {
    Aes128(Key<Aes128>),
    Aes192(Key<Aes192>),
    Aes256(Key<Aes256>),
}

/// Symmetric key shared by the relay and whoever issues tokens.
///
/// The length selects the cipher: 16 bytes for AES-128, 24 for AES-192 and
/// 32 for AES-256.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(CipherKey);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, DecodeError> {
        let bytes = bytes.into();
        let len = bytes.len();
        let iter = bytes.into_iter();
        let key = match len {
            16 => GenericArray::from_exact_iter(iter).map(CipherKey::Aes128),
            24 => GenericArray::from_exact_iter(iter).map(CipherKey::Aes192),
            32 => GenericArray::from_exact_iter(iter).map(CipherKey::Aes256),
            _ => None,
        };
        key.map(Self).ok_or(DecodeError::InvalidKeyLength(len))
    }

    pub(crate) fn key(&self) -> &CipherKey {
        &self.0
    }

    /// Key size in bits
    pub fn bits(&self) -> usize {
        match &self.0 {
            CipherKey::Aes128(_) => 128,
            CipherKey::Aes192(_) => 192,
            CipherKey::Aes256(_) => 256,
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret(AES-{})", self.bits())
    }
}

/// Suffix appended to every plaintext address before encryption.
///
/// Finding it intact after decryption is the only evidence that the token was
/// produced with the same key. An empty salt disables that check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
