/*! The relay server applying the processor to every inbound connection.
*/

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;

use husk_crypto::LayerKey;
use husk_packet::onion::OnionMessage;

use crate::relay::codec::OnionCodec;
use crate::relay::errors::{ConnectionError, ForwardingError, HandleMessageError, ServerRunError};
use crate::relay::processor::{process_message, FinalDelivery, ForwardInstruction, ProcessedMessage};

/** One relay identity applying the processor to every inbound stream.

The only state shared across connections is the immutable pre-shared key
and the delivery sink, so connection handling needs no locking.
*/
#[derive(Clone)]
pub struct Server {
    /// Relay identity used in logs.
    id: String,
    /// This relay's static layer key.
    key: LayerKey,
    /// Where exit-hop plaintext goes. When absent it is logged instead.
    delivery_sink: Option<mpsc::Sender<FinalDelivery>>,
}

impl Server {
    /// Create a relay server from its identity and pre-shared key.
    pub fn new(id: String, key: LayerKey) -> Server {
        Server {
            id,
            key,
            delivery_sink: None,
        }
    }

    /// Relay identity used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the sink that receives exit-hop plaintext.
    pub fn set_delivery_sink(&mut self, sink: mpsc::Sender<FinalDelivery>) {
        self.delivery_sink = Some(sink);
    }

    /** Handle one inbound onion message.

    Unwraps this relay's layer, then either passes the opaque payload to
    the successor over a fresh outbound connection or delivers the
    plaintext locally. Fire and forget: no acknowledgment is awaited and
    no error ever travels back towards the sender.
    */
    pub async fn handle_message(&self, message: &OnionMessage) -> Result<(), HandleMessageError> {
        match process_message(message, &self.key)? {
            ProcessedMessage::Forward(forward) => {
                info!("{} forwarding to {}", self.id, forward.to);
                self.forward(&forward).await.map_err(HandleMessageError::Forwarding)
            },
            ProcessedMessage::Deliver(delivery) => self.deliver(delivery).await,
        }
    }

    /// Open an outbound connection to the next hop, write the opaque
    /// payload as the entire body and close. No reply is read; there is no
    /// timeout and no retry, so a failed forward is terminal for the
    /// message.
    async fn forward(&self, forward: &ForwardInstruction) -> Result<(), ForwardingError> {
        let mut stream = TcpStream::connect((forward.to.host.as_str(), forward.to.port))
            .await
            .map_err(|error| ForwardingError::Connect { to: forward.to.clone(), error })?;

        stream
            .write_all(forward.payload.as_bytes())
            .await
            .map_err(|error| ForwardingError::Write { to: forward.to.clone(), error })?;

        stream
            .shutdown()
            .await
            .map_err(|error| ForwardingError::Write { to: forward.to.clone(), error })
    }

    /// Hand exit-hop plaintext to the configured sink, or log it.
    async fn deliver(&self, delivery: FinalDelivery) -> Result<(), HandleMessageError> {
        match self.delivery_sink.clone() {
            Some(mut sink) => {
                debug!("{} delivering final payload to sink", self.id);
                sink.send(delivery).await.map_err(HandleMessageError::Deliver)
            },
            None => {
                info!("{} final payload: {}", self.id, delivery.plaintext);
                Ok(())
            },
        }
    }
}

/** Run one inbound connection to completion.

Buffers the stream until the peer closes, parses the body as a single
onion message and handles it. The inbound connection is never held open
waiting for more messages, and nothing is ever written back on it.
*/
pub async fn relay_run_connection(server: &Server, stream: TcpStream) -> Result<(), ConnectionError> {
    let mut framed = FramedRead::new(stream, OnionCodec);

    let message = match framed.next().await {
        Some(message) => message?,
        None => {
            debug!("{} connection closed with no message", server.id());
            return Ok(());
        },
    };

    debug!("{} received message: {}", server.id(), message);
    server.handle_message(&message).await?;

    Ok(())
}

/** Run the relay server on inbound connections from `listener`.

Connections are handled concurrently, one task per connection, and are
accepted as fast as they arrive: there is no backpressure and no limit on
the number of concurrent connections, which is a known resource-exhaustion
exposure of this protocol. Per-message errors are logged and the message
dropped; the loop itself only fails when accepting connections fails.
*/
pub async fn relay_run(server: &Server, listener: TcpListener) -> Result<(), ServerRunError> {
    if let Ok(addr) = listener.local_addr() {
        info!("{} listening on {}", server.id(), addr);
    }

    loop {
        let (stream, addr) = listener.accept().await.map_err(ServerRunError::Accept)?;
        trace!("{} accepted connection from {}", server.id(), addr);

        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = relay_run_connection(&server, stream).await {
                error!("{} error processing message: {}", server.id(), e);
            }
        });
    }
}
