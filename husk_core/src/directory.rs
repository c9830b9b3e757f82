/*! The relay directory collaborator.

The directory publishes the list of available relays as a JSON array over
an unauthenticated HTTP GET:

```text
[{"id":"relay1","host":"127.0.0.1","port":9001,"key":"11111111111111111111111111111111"}]
```

`key` is a 32-character string used as the relay's raw AES-256 key bytes.
Descriptors are fetched once per sender run and never mutated afterwards.
*/

use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

use husk_crypto::LayerKey;
use husk_packet::hop_address::HopAddress;

/// Minimum number of relays a directory must publish before a sender
/// should use it. Shorter chains are accepted by `Circuit` itself but
/// carry no anonymity value.
pub const MIN_DIRECTORY_RELAYS: usize = 3;

/// Error that can happen when obtaining the relay list.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Directory is unreachable or answered with a non-success status.
    #[error("Directory request error: {0}")]
    Fetch(Box<ureq::Error>),
    /// Directory response body could not be read.
    #[error("Directory read error: {0}")]
    Read(std::io::Error),
    /// Directory response is not a valid relay list.
    #[error("Deserialize relay list error: {0}")]
    Deserialize(serde_json::Error),
    /// Directory has fewer relays than a useful circuit needs.
    #[error("Directory has {} relays, need at least {}", len, MIN_DIRECTORY_RELAYS)]
    NotEnoughRelays {
        /// Number of relays the directory returned.
        len: usize,
    },
}

/** Identity, address and pre-shared key of one relay.

Immutable once obtained from the directory. The sender holds one
descriptor per hop of its circuit; a running relay owns exactly its own
descriptor's key.
*/
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct RelayDescriptor {
    /// Relay identity, as published by the directory.
    pub id: String,
    /// Host the relay listens on.
    pub host: String,
    /// Port the relay listens on.
    pub port: u16,
    /// Pre-shared AES-256 key for this relay's layer.
    #[serde(deserialize_with = "de_layer_key")]
    pub key: LayerKey,
}

impl RelayDescriptor {
    /// Addressing info a predecessor learns about this relay.
    pub fn hop_address(&self) -> HopAddress {
        HopAddress {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

fn de_layer_key<'de, D>(deserializer: D) -> Result<LayerKey, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;

    s.parse()
        .map_err(|e| de::Error::custom(format!("Can't make layer key from string: {}", e)))
}

/// Parse a directory response body into relay descriptors, enforcing the
/// minimum relay count.
pub fn parse_relays(json: &str) -> Result<Vec<RelayDescriptor>, DirectoryError> {
    let relays: Vec<RelayDescriptor> = serde_json::from_str(json).map_err(DirectoryError::Deserialize)?;

    if relays.len() < MIN_DIRECTORY_RELAYS {
        return Err(DirectoryError::NotEnoughRelays { len: relays.len() });
    }

    Ok(relays)
}

/** Fetch the relay list from the directory.

The GET is unauthenticated and blocking; senders call it once at startup,
before the async runtime is running.
*/
pub fn fetch_relays(url: &str) -> Result<Vec<RelayDescriptor>, DirectoryError> {
    let body = ureq::get(url)
        .call()
        .map_err(|e| DirectoryError::Fetch(Box::new(e)))?
        .into_string()
        .map_err(DirectoryError::Read)?;

    parse_relays(&body)
}
