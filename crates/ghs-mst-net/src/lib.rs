//! # GHS MST Net
//!
//! Everything between a process's state machine and the network.
//!
//! ## Overview
//!
//! - [`wire`]: self-describing CBOR encoding of the seven protocol messages
//! - [`transport`]: the [`Transport`] seam, an in-memory network for tests and
//!   a TCP transport that carries exactly one message per connection
//! - [`runtime`]: the [`DispatchLoop`] that drains the bounded incoming queue
//!   into the core dispatcher and transmits whatever the handlers produce
//!
//! ## Data Flow
//!
//! ```text
//! Transport (accept) -> incoming queue -> DispatchLoop -> Dispatcher -> handler
//!        ^                                                               |
//!        '--------------- neighbour's Transport <- Transport::send <-----'
//! ```
//!
//! The loop is the only code that touches process state, so handlers never
//! need locks. Sends are fire-and-forget: a failed send is logged and the
//! message is dropped.

pub mod address;
pub mod error;
pub mod runtime;
pub mod transport;
pub mod wire;

pub use address::Addressing;
pub use error::{NetError, Result};
pub use runtime::{DispatchLoop, LoopOutcome};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, tcp::TcpTransport, Transport};
pub use wire::{decode, encode, WireMessage, MAX_MESSAGE_BYTES};
