/*! Building the nested onion message for a circuit.
*/

use rand::{CryptoRng, Rng};
use thiserror::Error;

use husk_packet::onion::{Layer, OnionMessage};

use crate::directory::RelayDescriptor;

/// Error that can happen when constructing a `Circuit`.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("A circuit must contain at least one relay")]
pub struct EmptyCircuitError;

/** Ordered chain of relays a message will traverse.

The order is exactly the traversal order; it is never reordered or
deduplicated. Any length >= 1 is accepted; a single-hop circuit makes the
one relay both entry and exit hop. The "at least three relays" rule lives
on the directory side, not here.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Circuit {
    hops: Vec<RelayDescriptor>,
}

impl Circuit {
    /// Create a circuit from an ordered, non-empty relay chain.
    pub fn new(hops: Vec<RelayDescriptor>) -> Result<Circuit, EmptyCircuitError> {
        if hops.is_empty() {
            return Err(EmptyCircuitError);
        }

        Ok(Circuit { hops })
    }

    /// The entry hop the built onion message is sent to.
    pub fn entry(&self) -> &RelayDescriptor {
        &self.hops[0]
    }

    /// Relays in traversal order.
    pub fn hops(&self) -> &[RelayDescriptor] {
        &self.hops
    }

    /** Wrap a plaintext message in one encryption layer per hop.

    Layers are built from the exit relay backwards: the innermost layer
    has no next hop and carries the plaintext; every outer layer carries
    its successor's address and the serialized inner onion message,
    encrypted under the owning relay's key. Only relay `i` can recover
    layer `i`, and it recovers nothing beyond its successor's address and
    an opaque payload.
    */
    pub fn build_onion<R: Rng + CryptoRng>(&self, rng: &mut R, message: &str) -> OnionMessage {
        let mut onion = None;

        for (i, relay) in self.hops.iter().enumerate().rev() {
            let payload = match onion {
                Some(inner) => inner.to_string(),
                None => message.to_owned(),
            };
            let next_hop = self.hops.get(i + 1).map(RelayDescriptor::hop_address);
            onion = Some(OnionMessage::new(rng, &relay.key, &Layer { next_hop, payload }));
        }

        onion.expect("Circuit contains at least one relay")
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use husk_crypto::LayerKey;

    use super::*;

    fn relay(id: &str, port: u16, key_byte: u8) -> RelayDescriptor {
        RelayDescriptor {
            id: id.to_owned(),
            host: "127.0.0.1".to_owned(),
            port,
            key: LayerKey::from([key_byte; 32]),
        }
    }

    #[test]
    fn empty_circuit() {
        assert_eq!(Circuit::new(Vec::new()), Err(EmptyCircuitError));
    }

    #[test]
    fn entry_is_first_hop() {
        let circuit = Circuit::new(vec![relay("relay1", 9001, 1), relay("relay2", 9002, 2)]).unwrap();
        assert_eq!(circuit.entry().id, "relay1");
    }

    #[test]
    fn single_hop_is_exit() {
        let mut rng = thread_rng();
        let descriptor = relay("relay1", 9001, 1);
        let circuit = Circuit::new(vec![descriptor.clone()]).unwrap();

        let onion = circuit.build_onion(&mut rng, "Hello from the client!");

        let layer = onion.get_payload(&descriptor.key).unwrap();
        assert_eq!(layer.next_hop, None);
        assert_eq!(layer.payload, "Hello from the client!");
    }

    #[test]
    fn layers_unwrap_in_circuit_order() {
        let mut rng = thread_rng();
        let relays = vec![
            relay("relay1", 9001, 1),
            relay("relay2", 9002, 2),
            relay("relay3", 9003, 3),
        ];
        let circuit = Circuit::new(relays.clone()).unwrap();

        let mut onion = circuit.build_onion(&mut rng, "Hello from the client!");

        for (i, descriptor) in relays.iter().enumerate() {
            let layer = onion.get_payload(&descriptor.key).unwrap();
            if i + 1 < relays.len() {
                // Every intermediate layer names exactly the next relay and
                // exposes nothing but an opaque payload.
                assert_eq!(layer.next_hop, Some(relays[i + 1].hop_address()));
                onion = layer.payload.parse().unwrap();
            } else {
                assert_eq!(layer.next_hop, None);
                assert_eq!(layer.payload, "Hello from the client!");
            }
        }
    }

    #[test]
    fn exactly_one_exit_layer() {
        let mut rng = thread_rng();
        let relays = vec![
            relay("relay1", 9001, 1),
            relay("relay2", 9002, 2),
            relay("relay3", 9003, 3),
            relay("relay4", 9004, 4),
        ];
        let circuit = Circuit::new(relays.clone()).unwrap();

        let mut onion = circuit.build_onion(&mut rng, "m");

        let mut exit_layers = 0;
        for descriptor in &relays {
            let layer = onion.get_payload(&descriptor.key).unwrap();
            match layer.next_hop {
                Some(_) => onion = layer.payload.parse().unwrap(),
                None => exit_layers += 1,
            }
        }
        assert_eq!(exit_layers, 1);
    }

    #[test]
    fn intermediate_relay_never_sees_plaintext() {
        let mut rng = thread_rng();
        let relays = vec![
            relay("relay1", 9001, 1),
            relay("relay2", 9002, 2),
            relay("relay3", 9003, 3),
        ];
        let circuit = Circuit::new(relays.clone()).unwrap();

        let onion = circuit.build_onion(&mut rng, "Hello from the client!");

        let layer = onion.get_payload(&relays[0].key).unwrap();
        assert!(!layer.payload.contains("Hello from the client!"));
        // Without the second relay's key the inner payload stays opaque.
        let inner: OnionMessage = layer.payload.parse().unwrap();
        assert!(inner.get_payload(&relays[0].key).is_err());
    }

    #[test]
    fn circuit_order_is_preserved() {
        let relays = vec![
            relay("relay3", 9003, 3),
            relay("relay1", 9001, 1),
            relay("relay2", 9002, 2),
        ];
        let circuit = Circuit::new(relays.clone()).unwrap();
        assert_eq!(circuit.hops(), relays.as_slice());
    }
}
