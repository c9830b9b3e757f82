/*! The pure per-message decision a relay makes.

Kept free of sockets so the protocol logic is testable on its own; all
network side effects live in the relay server.
*/

use husk_crypto::LayerKey;
use husk_packet::hop_address::HopAddress;
use husk_packet::onion::{GetPayloadError, OnionMessage};

/// Instruction to pass an opaque payload on to the successor relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForwardInstruction {
    /// Address of the successor relay.
    pub to: HopAddress,
    /// Payload to write there, byte-for-byte as recovered from the layer.
    /// It is never inspected or re-encrypted.
    pub payload: String,
}

/// Plaintext recovered at the exit hop. The end of the circuit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FinalDelivery {
    /// The original message as the sender wrote it.
    pub plaintext: String,
}

/// Result of unwrapping one onion layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProcessedMessage {
    /// The layer named a successor; the payload travels on.
    Forward(ForwardInstruction),
    /// This relay is the exit; the payload is the plaintext.
    Deliver(FinalDelivery),
}

/** Unwrap exactly one onion layer with this relay's key.

Stateless: every invocation depends only on the inbound message and the
key, and no state is kept between messages. Decryption failures propagate
unchanged; plaintext that does not parse into a layer record is a
malformed layer.
*/
pub fn process_message(
    inbound: &OnionMessage,
    key: &LayerKey,
) -> Result<ProcessedMessage, GetPayloadError> {
    let layer = inbound.get_payload(key)?;

    let processed = match layer.next_hop {
        Some(to) => ProcessedMessage::Forward(ForwardInstruction {
            to,
            payload: layer.payload,
        }),
        None => ProcessedMessage::Deliver(FinalDelivery {
            plaintext: layer.payload,
        }),
    };

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use husk_packet::onion::Layer;

    use crate::circuit::Circuit;
    use crate::directory::RelayDescriptor;

    use super::*;

    fn next_hop() -> HopAddress {
        HopAddress {
            host: "127.0.0.1".to_owned(),
            port: 9002,
        }
    }

    #[test]
    fn process_intermediate_layer() {
        let mut rng = thread_rng();
        let key = LayerKey::from([42; 32]);
        let message = OnionMessage::new(&mut rng, &key, &Layer {
            next_hop: Some(next_hop()),
            payload: "inner onion message".to_owned(),
        });

        let processed = process_message(&message, &key).unwrap();

        assert_eq!(processed, ProcessedMessage::Forward(ForwardInstruction {
            to: next_hop(),
            payload: "inner onion message".to_owned(),
        }));
    }

    #[test]
    fn process_exit_layer() {
        let mut rng = thread_rng();
        let key = LayerKey::from([42; 32]);
        let message = OnionMessage::new(&mut rng, &key, &Layer {
            next_hop: None,
            payload: "Hello from the client!".to_owned(),
        });

        let processed = process_message(&message, &key).unwrap();

        assert_eq!(processed, ProcessedMessage::Deliver(FinalDelivery {
            plaintext: "Hello from the client!".to_owned(),
        }));
    }

    #[test]
    fn process_garbage() {
        let key = LayerKey::from([42; 32]);
        let message = OnionMessage {
            iv: [42; 16],
            ciphertext: vec![42; 64],
        };
        assert!(process_message(&message, &key).is_err());
    }

    #[test]
    fn process_wrong_key_many_trials() {
        // Hop isolation: a relay holding the wrong key must never recover
        // a layer intended for another relay.
        let mut rng = thread_rng();
        for _ in 0..100 {
            let key = LayerKey::from(rng.gen::<[u8; 32]>());
            let wrong_key = LayerKey::from(rng.gen::<[u8; 32]>());
            let message = OnionMessage::new(&mut rng, &key, &Layer {
                next_hop: Some(next_hop()),
                payload: "inner onion message".to_owned(),
            });
            assert!(process_message(&message, &wrong_key).is_err());
        }
    }

    #[test]
    fn relays_peel_circuit_in_scenario_order() {
        // Three relays A, B, C: A and B forward, C delivers.
        let mut rng = thread_rng();
        let relays: Vec<RelayDescriptor> = (1u8..=3)
            .map(|i| RelayDescriptor {
                id: format!("relay{}", i),
                host: "127.0.0.1".to_owned(),
                port: 9000 + i as u16,
                key: LayerKey::from([i; 32]),
            })
            .collect();
        let circuit = Circuit::new(relays.clone()).unwrap();

        let onion = circuit.build_onion(&mut rng, "Hello from the client!");

        let forward_1 = match process_message(&onion, &relays[0].key).unwrap() {
            ProcessedMessage::Forward(forward) => forward,
            other => panic!("relay1 should forward, got {:?}", other),
        };
        assert_eq!(forward_1.to, relays[1].hop_address());

        let forward_2 = match process_message(&forward_1.payload.parse().unwrap(), &relays[1].key).unwrap() {
            ProcessedMessage::Forward(forward) => forward,
            other => panic!("relay2 should forward, got {:?}", other),
        };
        assert_eq!(forward_2.to, relays[2].hop_address());

        let delivery = match process_message(&forward_2.payload.parse().unwrap(), &relays[2].key).unwrap() {
            ProcessedMessage::Deliver(delivery) => delivery,
            other => panic!("relay3 should deliver, got {:?}", other),
        };
        assert_eq!(delivery.plaintext, "Hello from the client!");
    }
}
