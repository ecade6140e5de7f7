//! Transport abstraction.
//!
//! A transport delivers one encoded message to one neighbour. Inbound traffic
//! is pushed into the process's incoming queue by whoever owns the receiving
//! side (the TCP accept loop, or the in-memory network).

use async_trait::async_trait;

use ghs_mst_core::{Message, ProcessId};

use crate::error::Result;

/// Outbound side of the network, shared by every send site of a process.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message to a neighbour.
    ///
    /// No retries: an error means the message is lost.
    async fn send(&self, to: ProcessId, message: Message) -> Result<()>;

    /// The identity messages from this transport are stamped with.
    fn local_id(&self) -> ProcessId;
}

/// An in-memory transport for testing.
///
/// Messages still go through the wire codec so tests exercise the same bytes
/// as the TCP transport.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, RwLock};

    use crate::error::NetError;
    use crate::wire;

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Incoming queue of each attached process.
        senders: RwLock<HashMap<ProcessId, mpsc::Sender<Message>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Attach a process. Returns its transport and the receiving half of
        /// its bounded incoming queue.
        pub async fn create_transport(
            self: &Arc<Self>,
            id: ProcessId,
            capacity: usize,
        ) -> (MemoryTransport, mpsc::Receiver<Message>) {
            let (tx, rx) = mpsc::channel(capacity);
            self.senders.write().await.insert(id, tx);
            let transport = MemoryTransport {
                id,
                network: Arc::clone(self),
            };
            (transport, rx)
        }

        /// Detach a process; later sends to it fail.
        pub async fn disconnect(&self, id: ProcessId) {
            self.senders.write().await.remove(&id);
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                senders: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        id: ProcessId,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, to: ProcessId, message: Message) -> Result<()> {
            let sender = self.network.senders.read().await.get(&to).cloned();
            let sender = sender.ok_or_else(|| NetError::Unreachable {
                peer: to,
                reason: "not attached".into(),
            })?;
            let delivered = wire::decode(&wire::encode(&message)?)?;
            sender
                .send(delivered)
                .await
                .map_err(|_| NetError::Unreachable {
                    peer: to,
                    reason: "queue closed".into(),
                })
        }

        fn local_id(&self) -> ProcessId {
            self.id
        }
    }
}

/// TCP transport: one message per connection.
pub mod tcp {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    use crate::address::Addressing;
    use crate::error::NetError;
    use crate::wire::{self, MAX_MESSAGE_BYTES};

    /// How long an inbound connection may take to deliver its message and
    /// close. Senders write a few dozen bytes right after connecting.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

    /// Dials the neighbour's derived address for every message.
    #[derive(Debug, Clone)]
    pub struct TcpTransport {
        id: ProcessId,
        addressing: Addressing,
    }

    impl TcpTransport {
        pub fn new(id: ProcessId, addressing: Addressing) -> Self {
            Self { id, addressing }
        }
    }

    #[async_trait]
    impl Transport for TcpTransport {
        async fn send(&self, to: ProcessId, message: Message) -> Result<()> {
            let addr = self
                .addressing
                .address_of(to)
                .ok_or_else(|| NetError::Unreachable {
                    peer: to,
                    reason: "no address for process".into(),
                })?;
            let bytes = wire::encode(&message)?;
            let mut stream =
                TcpStream::connect(addr)
                    .await
                    .map_err(|e| NetError::Unreachable {
                        peer: to,
                        reason: e.to_string(),
                    })?;
            stream.write_all(&bytes).await?;
            stream.shutdown().await?;
            Ok(())
        }

        fn local_id(&self) -> ProcessId {
            self.id
        }
    }

    /// Accept connections until the incoming queue is closed.
    ///
    /// Each connection is read on its own task; malformed messages are logged
    /// and discarded, never enqueued. Decoded messages are enqueued in accept
    /// order, so a neighbour that sends one message after another is seen in
    /// the order it sent them.
    ///
    /// A connection that has not closed within `read_timeout` is dropped
    /// with whatever it sent, so an idle peer holds up later messages for at
    /// most that long.
    pub async fn serve(
        listener: TcpListener,
        inbox: mpsc::Sender<Message>,
        read_timeout: Duration,
    ) -> Result<()> {
        let (order_tx, mut order_rx) = mpsc::unbounded_channel::<JoinHandle<Option<Message>>>();
        let forwarder = tokio::spawn(async move {
            while let Some(read) = order_rx.recv().await {
                if let Ok(Some(message)) = read.await {
                    if inbox.send(message).await.is_err() {
                        debug!("incoming queue closed");
                        break;
                    }
                }
            }
        });

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            if forwarder.is_finished() {
                return Err(NetError::QueueClosed);
            }
            let read = tokio::spawn(async move {
                match tokio::time::timeout(read_timeout, read_message(stream)).await {
                    Ok(Ok(message)) => Some(message),
                    Ok(Err(e)) => {
                        warn!(%peer, error = %e, "discarding inbound message");
                        None
                    }
                    Err(_) => {
                        warn!(%peer, ?read_timeout, "inbound connection timed out, discarding");
                        None
                    }
                }
            });
            if order_tx.send(read).is_err() {
                return Err(NetError::QueueClosed);
            }
        }
    }

    async fn read_message(stream: TcpStream) -> Result<Message> {
        let mut buf = Vec::with_capacity(128);
        stream
            .take(MAX_MESSAGE_BYTES as u64 + 1)
            .read_to_end(&mut buf)
            .await?;
        wire::decode(&buf)
    }
}
