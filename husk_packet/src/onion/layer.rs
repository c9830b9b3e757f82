/*! One decrypted onion layer.
*/

use serde::{Deserialize, Serialize};

use crate::hop_address::HopAddress;
use crate::onion::errors::MalformedLayerError;

/** Contents of one onion layer after decryption.

Serialized form is canonical JSON with a `nextHop` object and a `payload`
string:

```text
{"nextHop":{"host":"127.0.0.1","port":9002},"payload":"<inner onion message>"}
{"nextHop":null,"payload":"<plaintext>"}
```

`nextHop` absent or `null` marks the exit layer, whose `payload` is the
original plaintext. Otherwise `payload` is the serialized onion message
for the relay at `nextHop`, opaque to the current hop.
*/
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Address of the successor relay, or `None` on the exit layer.
    #[serde(rename = "nextHop", default)]
    pub next_hop: Option<HopAddress>,
    /// Nested onion message, or the plaintext at the exit.
    pub payload: String,
}

impl Layer {
    /// Serialize to the canonical JSON encoding.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Parse from the canonical JSON encoding.
    pub fn from_json(s: &str) -> Result<Layer, MalformedLayerError> {
        serde_json::from_str(s).map_err(MalformedLayerError)
    }
}
