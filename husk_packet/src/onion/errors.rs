/*! Errors enum for onion layer packets.
*/

use base64::DecodeError as Base64Error;
use thiserror::Error;

use husk_crypto::InvalidPaddingError;

/// Error that can happen when decrypting one onion layer.
///
/// Covers accidental corruption and adversarial tampering alike; the two
/// are indistinguishable because the cipher mode carries no integrity
/// check.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecryptionError {
    /// The wire form has no `:` separator between IV and ciphertext.
    #[error("Onion message has no ':' separator")]
    MissingSeparator,
    /// IV or ciphertext is not valid base64.
    #[error("Invalid base64: {0}")]
    Base64(Base64Error),
    /// Decoded IV is not exactly `IV_SIZE` bytes.
    #[error("Invalid IV length: {} bytes", len)]
    InvalidIvLength {
        /// Length of the decoded IV.
        len: usize,
    },
    /// Ciphertext length is not a multiple of the cipher block size, or
    /// its padding is invalid after decryption.
    #[error("Invalid ciphertext padding")]
    InvalidPadding,
    /// Decrypted bytes are not valid UTF-8. Happens when tampered or
    /// wrong-key ciphertext passes the padding check by chance.
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

impl From<Base64Error> for DecryptionError {
    fn from(error: Base64Error) -> DecryptionError {
        DecryptionError::Base64(error)
    }
}

impl From<InvalidPaddingError> for DecryptionError {
    fn from(_: InvalidPaddingError) -> DecryptionError {
        DecryptionError::InvalidPadding
    }
}

/// Error that can happen when decrypted plaintext does not parse into a
/// valid layer record: not JSON at all, missing `payload`, or a `nextHop`
/// without `host` or `port`.
#[derive(Debug, Error)]
#[error("Deserialize layer error: {0}")]
pub struct MalformedLayerError(pub serde_json::Error);

/// Error that can happen when calling `get_payload` of an onion message.
#[derive(Debug, Error)]
pub enum GetPayloadError {
    /// The layer could not be decrypted.
    #[error("Decrypt payload error: {0}")]
    Decryption(#[from] DecryptionError),
    /// The decrypted plaintext is not a valid layer.
    #[error("Deserialize payload error: {0}")]
    MalformedLayer(#[from] MalformedLayerError),
}
