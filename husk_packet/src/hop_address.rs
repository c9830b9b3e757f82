/*! Addressing info one relay learns about its successor.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/** Host and port of the next relay in a circuit.

This is the only routing information a relay ever recovers: the address of
its immediate successor. It never learns any hop beyond that, and it never
learns its own position in the circuit.

The host stays a string because the directory may publish host names as
well as IP addresses; resolution happens when the outbound connection is
opened.
*/
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HopAddress {
    /// Host name or IP address of the relay.
    pub host: String,
    /// TCP port the relay listens on.
    pub port: u16,
}

impl fmt::Display for HopAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
