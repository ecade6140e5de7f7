//! Error types for the networking layer.

use thiserror::Error;

use ghs_mst_core::ProcessId;

/// Errors that can occur while encoding, sending or receiving messages.
#[derive(Debug, Error)]
pub enum NetError {
    /// Message could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Bytes on the wire are not a valid message.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Decoded message violates the schema.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Message exceeds the size limit.
    #[error("message too large: {0} bytes")]
    TooLarge(usize),

    /// Peer could not be reached.
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: ProcessId, reason: String },

    /// Incoming queue has been closed.
    #[error("incoming queue closed")]
    QueueClosed,

    /// State machine refused to start.
    #[error("process error: {0}")]
    Core(#[from] ghs_mst_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for networking operations.
pub type Result<T> = std::result::Result<T, NetError>;
