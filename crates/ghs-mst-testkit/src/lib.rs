//! # GHS MST Testkit
//!
//! Testing utilities for the spanning tree protocol.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Graphs**: a small weighted-graph type with a reference (Kruskal) MST
//! - **Generators**: Proptest strategies for connected graphs and messages
//! - **Fixtures**: named graphs used across the test suites
//! - **Simulation**: drives core dispatchers over in-process FIFO links,
//!   delivering in send order or in a seeded random interleaving
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ghs_mst_testkit::generators::connected_graph;
//! use ghs_mst_testkit::simulation::{DeliveryOrder, Simulation};
//!
//! proptest! {
//!     #[test]
//!     fn finds_the_mst(graph in connected_graph(8), seed: u64) {
//!         let mut sim = Simulation::new(&graph)
//!             .unwrap()
//!             .with_order(DeliveryOrder::Random(seed));
//!         sim.wake(graph.initiator).unwrap();
//!         let outcome = sim.run(100_000);
//!         prop_assert_eq!(outcome.tree_weights(), graph.minimum_spanning_tree());
//!     }
//! }
//! ```
//!
//! ## Fixtures
//!
//! ```rust
//! use ghs_mst_testkit::fixtures::triangle;
//! use ghs_mst_testkit::simulation::Simulation;
//!
//! let graph = triangle();
//! let mut sim = Simulation::new(&graph).unwrap();
//! sim.wake(graph.initiator).unwrap();
//! let outcome = sim.run(1_000);
//! assert_eq!(outcome.halted.len(), 2);
//! ```

pub mod fixtures;
pub mod generators;
pub mod graph;
pub mod simulation;

pub use fixtures::{line, star, tie_break, triangle};
pub use generators::{connected_graph, message};
pub use graph::{Edge, Graph};
pub use simulation::{DeliveryOrder, SimOutcome, Simulation};
