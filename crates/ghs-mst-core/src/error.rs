//! Error types for the core state machine.

use thiserror::Error;

use crate::link::EdgeState;
use crate::types::{ProcessId, Weight};

/// Errors raised by handlers and link bookkeeping.
///
/// None of these are fatal for a running process: the dispatcher logs them
/// and drops the message that triggered them.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("message from {0} does not match any link")]
    UnknownSender(ProcessId),

    #[error("process {0} has no links")]
    Isolated(ProcessId),

    #[error("duplicate link to neighbour {0}")]
    DuplicateNeighbor(ProcessId),

    #[error("link of weight {weight} cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        weight: Weight,
        from: EdgeState,
        to: EdgeState,
    },

    #[error("pending response counter underflow")]
    PendingUnderflow,

    #[error("report requested before an in-branch edge was set")]
    NoInBranch,

    #[error("core change requested without a best edge")]
    NoBestEdge,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
