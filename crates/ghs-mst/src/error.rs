//! Error types for configuration and the node runtime.

use std::net::SocketAddr;

use ghs_mst_core::{ProcessId, Weight};
use ghs_mst_net::NetError;
use thiserror::Error;

/// Errors in the topology file or the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Topology file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// First meaningful line is not a process id.
    #[error("line {line}: expected the id of the initiating process")]
    MissingInitiator { line: usize },

    /// Edge line is not `source destination weight`.
    #[error("line {line}: malformed edge {text:?}")]
    MalformedEdge { line: usize, text: String },

    #[error("line {line}: self-loop on process {id}")]
    SelfLoop { line: usize, id: ProcessId },

    #[error("line {line}: duplicate edge between {a} and {b}")]
    DuplicateEdge {
        line: usize,
        a: ProcessId,
        b: ProcessId,
    },

    /// Weights must be pairwise distinct.
    #[error("line {line}: weight {weight} already used")]
    DuplicateWeight { line: usize, weight: Weight },

    #[error("line {line}: weight {weight} is reserved")]
    ReservedWeight { line: usize, weight: Weight },

    /// Bad command-line flag or environment variable.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Own identity could not be determined.
    #[error("cannot resolve process identity: {0}")]
    Identity(String),
}

/// Errors raised while starting or running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("network error: {0}")]
    Net(#[from] NetError),

    /// The topology lists no edge touching this process.
    #[error("process {0} has no links in the topology")]
    NoLinks(ProcessId),

    /// The addressing scheme can't express this process id.
    #[error("no listen address for process {0}")]
    NoAddress(ProcessId),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
