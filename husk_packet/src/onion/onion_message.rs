/*! OnionMessage packet with one encrypted Layer payload.
*/

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::{CryptoRng, Rng};

use husk_crypto::{decrypt_layer, encrypt_layer, gen_iv, Iv, LayerKey};

use crate::onion::errors::{DecryptionError, GetPayloadError};
use crate::onion::layer::Layer;

/** One fully encrypted onion layer as it travels between hops.

Wire form is text:

```text
base64(iv) + ":" + base64(ciphertext)
```

with no length prefix, no version marker and no authentication tag. The
payload of an intermediate layer, once decrypted and parsed, exposes the
next `OnionMessage`; at the exit hop it exposes the original plaintext.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionMessage {
    /// IV the payload was encrypted with.
    pub iv: Iv,
    /// Encrypted serialized `Layer`.
    pub ciphertext: Vec<u8>,
}

impl OnionMessage {
    /** Create new `OnionMessage` object by encrypting a `Layer` under one
    relay's key.

    A fresh random IV is drawn for every call; IVs are never reused.
    */
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, key: &LayerKey, payload: &Layer) -> OnionMessage {
        let iv = gen_iv(rng);
        let ciphertext = encrypt_layer(key, &iv, payload.to_json().as_bytes());
        OnionMessage { iv, ciphertext }
    }

    /** Decrypt payload and try to parse it as `Layer`.

    Returns `Error` in case of failure:

    - fails to decrypt
    - fails to parse as `Layer`
    */
    pub fn get_payload(&self, key: &LayerKey) -> Result<Layer, GetPayloadError> {
        let decrypted = decrypt_layer(key, &self.iv, &self.ciphertext)
            .map_err(DecryptionError::from)?;
        let plaintext = String::from_utf8(decrypted)
            .map_err(|_| DecryptionError::InvalidUtf8)?;
        Ok(Layer::from_json(&plaintext)?)
    }
}

impl fmt::Display for OnionMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", BASE64.encode(self.iv), BASE64.encode(&self.ciphertext))
    }
}

impl FromStr for OnionMessage {
    type Err = DecryptionError;

    fn from_str(s: &str) -> Result<OnionMessage, DecryptionError> {
        let (iv, ciphertext) = s.split_once(':').ok_or(DecryptionError::MissingSeparator)?;
        let iv = BASE64.decode(iv)?;
        let iv: Iv = iv
            .try_into()
            .map_err(|iv: Vec<u8>| DecryptionError::InvalidIvLength { len: iv.len() })?;
        let ciphertext = BASE64.decode(ciphertext)?;
        Ok(OnionMessage { iv, ciphertext })
    }
}
