use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cfb_mode::cipher::generic_array::GenericArray;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tunnelgate_core::{AddressError, DestinationAddress};

use crate::keys::CipherKey;
use crate::{Salt, SharedSecret, BLOCK_SIZE};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Token too short: {len} bytes after base64 decoding")]
    Truncated { len: usize },

    #[error("Salt check failed")]
    SaltMismatch,

    #[error("Decrypted address is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid destination address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Invalid key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),
}

/// Anything that can turn a wire token into a destination address.
///
/// The relay only depends on this trait, so the resolver can be driven by a
/// test double.
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &[u8]) -> Result<DestinationAddress, DecodeError>;
}

/// AES-CFB token codec bound to one secret and salt
#[derive(Debug, Clone)]
pub struct TokenCodec {
    secret: SharedSecret,
    salt: Salt,
}

impl TokenCodec {
    pub fn new(secret: SharedSecret, salt: Salt) -> Self {
        Self { secret, salt }
    }

    /// Build a codec from raw key and salt bytes, validating the key length
    pub fn from_bytes(secret: &[u8], salt: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::new(SharedSecret::new(secret)?, Salt::new(salt)))
    }

    /// Issue a token for `address` with a fresh random IV
    pub fn encode(&self, address: &DestinationAddress) -> String {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);
        self.seal(iv, address.as_str().as_bytes())
    }

    /// Decode a wire token into the address it names.
    ///
    /// 1. Base64 decode (standard alphabet, padded)
    /// 2. Split off the leading IV
    /// 3. AES-CFB decrypt the remainder in place
    /// 4. Check and strip the salt suffix
    /// 5. Parse what is left as `host:port`
    pub fn decode(&self, token: &[u8]) -> Result<DestinationAddress, DecodeError> {
        let mut data = STANDARD.decode(token)?;
        if data.len() <= BLOCK_SIZE {
            return Err(DecodeError::Truncated { len: data.len() });
        }

        let (iv, text) = data.split_at_mut(BLOCK_SIZE);
        cfb_decrypt(&self.secret, iv, text);

        let salt = self.salt.as_bytes();
        if !text.ends_with(salt) {
            return Err(DecodeError::SaltMismatch);
        }
        let address = &text[..text.len() - salt.len()];

        let address = std::str::from_utf8(address).map_err(|_| DecodeError::NotUtf8)?;
        Ok(DestinationAddress::parse(address)?)
    }

    fn seal(&self, iv: [u8; BLOCK_SIZE], plaintext: &[u8]) -> String {
        let salt = self.salt.as_bytes();
        let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len() + salt.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);
        out.extend_from_slice(salt);

        cfb_encrypt(&self.secret, &iv, &mut out[BLOCK_SIZE..]);
        STANDARD.encode(&out)
    }
}

impl TokenDecoder for TokenCodec {
    fn decode(&self, token: &[u8]) -> Result<DestinationAddress, DecodeError> {
        TokenCodec::decode(self, token)
    }
}

/// One-shot decode for callers that do not keep a codec around
pub fn decode_token(
    token: &[u8],
    secret: &[u8],
    salt: &[u8],
) -> Result<DestinationAddress, DecodeError> {
    TokenCodec::from_bytes(secret, salt)?.decode(token)
}

/// One-shot token issue with a fresh random IV
pub fn encode_token(
    address: &DestinationAddress,
    secret: &[u8],
    salt: &[u8],
) -> Result<String, DecodeError> {
    Ok(TokenCodec::from_bytes(secret, salt)?.encode(address))
}

/// `iv` is the first `BLOCK_SIZE` bytes of the decoded token
fn cfb_decrypt(secret: &SharedSecret, iv: &[u8], buf: &mut [u8]) {
    let iv = GenericArray::from_slice(iv);
    match secret.key() {
        CipherKey::Aes128(key) => Decryptor::<Aes128>::new(key, iv).decrypt(buf),
        CipherKey::Aes192(key) => Decryptor::<Aes192>::new(key, iv).decrypt(buf),
        CipherKey::Aes256(key) => Decryptor::<Aes256>::new(key, iv).decrypt(buf),
    }
}

fn cfb_encrypt(secret: &SharedSecret, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let iv = GenericArray::from_slice(iv);
    match secret.key() {
        CipherKey::Aes128(key) => Encryptor::<Aes128>::new(key, iv).encrypt(buf),
        CipherKey::Aes192(key) => Encryptor::<Aes192>::new(key, iv).encrypt(buf),
        CipherKey::Aes256(key) => Encryptor::<Aes256>::new(key, iv).encrypt(buf),
    }
}
