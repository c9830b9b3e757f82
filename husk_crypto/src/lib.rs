//! Functions for the symmetric layer cipher.
//!
//! Every onion layer is encrypted with AES-256-CBC under the owning relay's
//! pre-shared static key, with a fresh random IV for every encryption. The
//! mode provides confidentiality only: there is no authentication tag, so
//! corrupted or tampered ciphertext is indistinguishable from an honest
//! message encrypted under a different key.

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{CryptoRng, Rng};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Number of bytes in a `LayerKey`.
pub const KEY_SIZE: usize = 32;

/// Number of bytes in an initialization vector.
pub const IV_SIZE: usize = 16;

/// Initialization vector for one layer encryption.
pub type Iv = [u8; IV_SIZE];

/// Error that can happen when constructing a `LayerKey` from raw bytes.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("Layer key must be exactly {} bytes: {} bytes", KEY_SIZE, len)]
pub struct InvalidKeyLengthError {
    /// Length of the rejected key material.
    pub len: usize,
}

/// Error that can happen when decrypting a layer. Covers both ciphertext
/// whose length is not a multiple of the cipher block size and ciphertext
/// whose PKCS#7 padding is invalid after decryption.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("Invalid ciphertext padding")]
pub struct InvalidPaddingError;

/** Pre-shared AES-256 key for exactly one relay's layer.

The directory distributes a key per relay; the sender encrypts that relay's
layer with it and the relay decrypts with the same key. The key is static
for the lifetime of the relay process.

Key material never appears in `Debug` output.
*/
#[derive(Clone, Eq, PartialEq)]
pub struct LayerKey([u8; KEY_SIZE]);

impl LayerKey {
    /// Create a key from a byte slice of exactly `KEY_SIZE` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<LayerKey, InvalidKeyLengthError> {
        match <[u8; KEY_SIZE]>::try_from(bytes) {
            Ok(key) => Ok(LayerKey(key)),
            Err(_) => Err(InvalidKeyLengthError { len: bytes.len() }),
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for LayerKey {
    fn from(bytes: [u8; KEY_SIZE]) -> LayerKey {
        LayerKey(bytes)
    }
}

impl FromStr for LayerKey {
    type Err = InvalidKeyLengthError;

    /// The directory publishes keys as 32-character strings used as raw
    /// key bytes, so the string must be exactly `KEY_SIZE` bytes long.
    fn from_str(s: &str) -> Result<LayerKey, InvalidKeyLengthError> {
        LayerKey::from_slice(s.as_bytes())
    }
}

impl fmt::Debug for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LayerKey(****)")
    }
}

/// Generate a fresh random IV from a cryptographically secure source.
pub fn gen_iv<R: Rng + CryptoRng>(rng: &mut R) -> Iv {
    rng.gen()
}

/** Encrypt one onion layer.

The plaintext is padded with PKCS#7, so the ciphertext length is always a
multiple of the cipher block size.
*/
pub fn encrypt_layer(key: &LayerKey, iv: &Iv, plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new((&key.0).into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/** Decrypt one onion layer.

Returns `InvalidPaddingError` when the ciphertext length is not a multiple
of the cipher block size or the padding is invalid after decryption. A
wrong key usually fails this way, but without an integrity check it can
also decrypt to garbage without error; callers must validate the result.
*/
pub fn decrypt_layer(key: &LayerKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>, InvalidPaddingError> {
    Aes256CbcDec::new((&key.0).into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| InvalidPaddingError)
}
