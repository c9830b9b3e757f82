/*! Codec for reading one onion message per connection in terms of tokio-io.

Framing between hops is "read until stream end": bytes buffer until the
peer closes the connection, and the whole body parses as a single message.
There is no length prefix, no version marker and no multi-message
pipelining per connection.
*/

use std::io::Error as IoError;
use std::str;

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use husk_packet::onion::{DecryptionError, OnionMessage};

/// A serialized onion message should be not longer than 1 MiB. This only
/// bounds the per-connection read buffer; it is not message framing.
pub const MAX_ONION_MESSAGE_SIZE: usize = 1024 * 1024;

/// Error that can happen when decoding an `OnionMessage` from bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Error indicates that we received too big message.
    #[error("Message should not be longer than {} bytes: {} bytes", MAX_ONION_MESSAGE_SIZE, len)]
    TooBigMessage {
        /// Number of bytes received so far.
        len: usize,
    },
    /// Received bytes are not valid UTF-8.
    #[error("Message is not valid UTF-8")]
    InvalidUtf8,
    /// Received text is not a valid onion message.
    #[error("Deserialize OnionMessage error: {0}")]
    Deserialize(DecryptionError),
    /// General IO error that can happen with a TCP socket.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

/// Error that can happen when encoding an `OnionMessage` to bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// General IO error that can happen with a TCP socket.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

/// Struct to use for (de)serializing onion messages over one connection.
#[derive(Clone, Debug, Default)]
pub struct OnionCodec;

impl Decoder for OnionCodec {
    type Item = OnionMessage;
    type Error = DecodeError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<OnionMessage>, DecodeError> {
        // The body only ends when the peer closes the connection; until
        // then just bound the buffer.
        if buf.len() > MAX_ONION_MESSAGE_SIZE {
            return Err(DecodeError::TooBigMessage { len: buf.len() });
        }

        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<OnionMessage>, DecodeError> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf.len() > MAX_ONION_MESSAGE_SIZE {
            return Err(DecodeError::TooBigMessage { len: buf.len() });
        }

        let body = buf.split_to(buf.len());
        let text = str::from_utf8(&body).map_err(|_| DecodeError::InvalidUtf8)?;
        // A trailing newline appears when messages are piped in from shell
        // tools; it is not part of the body.
        let message = text
            .trim_end()
            .parse()
            .map_err(DecodeError::Deserialize)?;

        Ok(Some(message))
    }
}

impl Encoder<OnionMessage> for OnionCodec {
    type Error = EncodeError;

    fn encode(&mut self, message: OnionMessage, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.extend_from_slice(message.to_string().as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use husk_crypto::LayerKey;
    use husk_packet::onion::Layer;

    use super::*;

    fn test_message() -> OnionMessage {
        OnionMessage::new(&mut thread_rng(), &LayerKey::from([42; 32]), &Layer {
            next_hop: None,
            payload: "Hello from the client!".to_owned(),
        })
    }

    #[test]
    fn encode_decode() {
        let message = test_message();
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();

        codec.encode(message.clone(), &mut buf).expect("should encode");

        // Mid-stream nothing decodes; the message is only complete at EOF.
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let res = codec.decode_eof(&mut buf).unwrap().expect("should decode");
        assert_eq!(res, message);

        // The buffer is consumed; the connection yields exactly one message.
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_empty_connection() {
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_trailing_newline() {
        let message = test_message();
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(format!("{}\n", message).as_bytes());

        let res = codec.decode_eof(&mut buf).unwrap().expect("should decode");
        assert_eq!(res, message);
    }

    #[test]
    fn decode_garbage() {
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"not an onion message");

        let res = codec.decode_eof(&mut buf);
        assert!(matches!(
            res,
            Err(DecodeError::Deserialize(DecryptionError::MissingSeparator)),
        ));
    }

    #[test]
    fn decode_invalid_utf8() {
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"\xff\xfe\xfd");

        assert!(matches!(codec.decode_eof(&mut buf), Err(DecodeError::InvalidUtf8)));
    }

    #[test]
    fn decode_message_too_big() {
        let mut codec = OnionCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&vec![b'A'; MAX_ONION_MESSAGE_SIZE + 1]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(DecodeError::TooBigMessage { len }) if len == MAX_ONION_MESSAGE_SIZE + 1,
        ));
    }
}
