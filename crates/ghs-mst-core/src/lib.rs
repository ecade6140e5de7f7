//! # GHS MST Core
//!
//! Pure per-process state machine for building a minimum spanning tree over a
//! weighted, connected, undirected graph whose vertices are independent
//! processes exchanging point-to-point messages.
//!
//! This crate contains no I/O, no networking and no clocks. Handlers mutate a
//! single [`ProcessState`] and append outbound messages to its outbox; the
//! caller decides how those messages travel.
//!
//! ## Key Types
//!
//! - [`Link`] - One edge to a neighbouring process, with its weight and classification
//! - [`Links`] - Index-addressed arena of links, sorted ascending by weight
//! - [`Message`] - A protocol message tagged with its sender
//! - [`ProcessState`] - Fragment level, fragment id, search bookkeeping and handlers
//! - [`Dispatcher`] - Sender resolution, kind dispatch and the deferral backlog
//!
//! ## Message Flow
//!
//! ```text
//! Fragment A (level L)                 Fragment B (level L)
//!   |-------- Connect(L) ------------->|
//!   |<------- Connect(L) --------------|
//!   |<------- Initiate(L+1, w, Find) --|
//!   |-------- Initiate(L+1, w, Find) ->|
//!   |-------- Test / Accept / Reject --|   (minimum outgoing edge search)
//!   |<------- Report(w) ---------------|
//!   |-------- ChangeCore ------------->|   (or halt when both report Infinity)
//! ```

pub mod dispatch;
pub mod error;
pub mod link;
pub mod message;
pub mod process;
pub mod types;

pub use dispatch::{DispatchStats, Dispatcher, Eligibility, Step};
pub use error::{CoreError, Result};
pub use link::{EdgeState, Link, Links};
pub use message::{Message, MessageKind, NodeState, Outgoing, Payload};
pub use process::{Handled, ProcessState, ProcessSummary};
pub use types::{FragmentId, Level, LinkId, ProcessId, Weight};
