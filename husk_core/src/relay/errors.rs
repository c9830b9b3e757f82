/*! Errors enum for the relay server.
*/

use std::io::Error as IoError;

use futures::channel::mpsc::SendError;
use thiserror::Error;

use husk_packet::hop_address::HopAddress;
use husk_packet::onion::GetPayloadError;

use crate::relay::codec::DecodeError;

/// Error that can happen when passing a payload on to the next hop.
#[derive(Debug, Error)]
pub enum ForwardingError {
    /// Outbound connection to the next hop could not be established.
    #[error("Connect to next hop {} error: {}", to, error)]
    Connect {
        /// Address of the next hop.
        to: HopAddress,
        /// Connect error.
        error: IoError,
    },
    /// Payload could not be written to the next hop.
    #[error("Write to next hop {} error: {}", to, error)]
    Write {
        /// Address of the next hop.
        to: HopAddress,
        /// Write error.
        error: IoError,
    },
}

/// Error that can happen when handling one inbound onion message.
#[derive(Debug, Error)]
pub enum HandleMessageError {
    /// This relay's layer could not be unwrapped.
    #[error("Process message error: {0}")]
    Process(#[from] GetPayloadError),
    /// The opaque payload could not be passed to the next hop.
    #[error("Forward message error: {0}")]
    Forwarding(#[from] ForwardingError),
    /// The delivery sink rejected the exit-hop plaintext.
    #[error("Deliver plaintext error: {0}")]
    Deliver(SendError),
}

/// Error that can happen when running one inbound connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Reading the inbound message failed.
    #[error("Read message error: {0}")]
    ReadSocket(#[from] DecodeError),
    /// Handling the message failed.
    #[error("Handle message error: {0}")]
    Handle(#[from] HandleMessageError),
}

/// Error that can happen when running the relay listener.
#[derive(Debug, Error)]
pub enum ServerRunError {
    /// Accepting an inbound connection failed.
    #[error("Accept connection error: {0}")]
    Accept(IoError),
}
