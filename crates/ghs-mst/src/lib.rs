//! # GHS minimum spanning tree
//!
//! Every process of a connected, weighted graph runs the same message-driven
//! state machine and learns which of its incident edges belong to the
//! graph's minimum spanning tree, without any global view of the graph.
//!
//! ## Overview
//!
//! - **Fragments** start as single processes at level 0 and merge along their
//!   minimum-weight outgoing edge until one fragment spans the graph.
//! - **Edges** are classified once, from `Basic` to `Branch` (in the tree) or
//!   `Rejected` (not in the tree).
//! - **Termination** is detected by the two endpoints of the final core edge
//!   when a search finds no outgoing edge anywhere.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ghs_mst::{Node, NodeConfig};
//! use tokio::sync::watch;
//!
//! async fn example() -> ghs_mst::Result<()> {
//!     let config = NodeConfig::default();
//!     let node = Node::from_config(config)?;
//!     let (_stop, shutdown) = watch::channel(false);
//!     let outcome = node.run(shutdown).await?;
//!     println!("tree edges: {:?}", outcome.summary.branch_weights());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ghs_mst::core` - the protocol state machine and message types
//! - `ghs_mst::net` - wire codec, transports and the dispatch loop

pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod node;

pub use ghs_mst_core as core;
pub use ghs_mst_net as net;

pub use config::{EdgeSpec, NodeConfig, Topology};
pub use error::{ConfigError, NodeError, Result};
pub use identity::resolve_identity;
pub use node::Node;

pub use ghs_mst_core::{EdgeState, Message, NodeState, ProcessId, ProcessSummary, Weight};
pub use ghs_mst_net::{Addressing, LoopOutcome};
