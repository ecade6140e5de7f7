//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::sample::Index;

use ghs_mst_core::{FragmentId, Level, Message, NodeState, Payload, ProcessId, Weight};

use crate::graph::{Edge, Graph};

/// Generate a connected graph with 2 to `max_processes` processes, ids
/// starting at 1, and pairwise distinct weights.
///
/// A random spanning tree guarantees connectivity; up to `n` extra edges add
/// cycles. Weights are a shuffled sample of `1..=4 * edges`.
pub fn connected_graph(max_processes: u32) -> impl Strategy<Value = Graph> {
    (2..=max_processes.max(2))
        .prop_flat_map(|n| {
            let parents = prop::collection::vec(any::<Index>(), (n - 1) as usize);
            let extras = prop::collection::vec((any::<Index>(), any::<Index>()), 0..=n as usize);
            (Just(n), parents, extras, 1..=n)
        })
        .prop_flat_map(|(n, parents, extras, initiator)| {
            let pairs = vertex_pairs(n, &parents, &extras);
            let weights =
                Just((1..=pairs.len() as u64 * 4).collect::<Vec<_>>()).prop_shuffle();
            (Just(initiator), Just(pairs), weights)
        })
        .prop_map(|(initiator, pairs, weights)| Graph {
            initiator: ProcessId(initiator),
            edges: pairs
                .into_iter()
                .zip(weights)
                .map(|((a, b), w)| Edge {
                    a: ProcessId(a),
                    b: ProcessId(b),
                    weight: Weight(w),
                })
                .collect(),
        })
}

fn vertex_pairs(n: u32, parents: &[Index], extras: &[(Index, Index)]) -> Vec<(u32, u32)> {
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();
    let mut add = |a: u32, b: u32| {
        if a != b && seen.insert((a.min(b), a.max(b))) {
            pairs.push((a, b));
        }
    };
    for (i, parent) in parents.iter().enumerate() {
        let child = i as u32 + 2;
        add(parent.index(child as usize - 1) as u32 + 1, child);
    }
    for (x, y) in extras {
        add(x.index(n as usize) as u32 + 1, y.index(n as usize) as u32 + 1);
    }
    pairs
}

/// Generate a connected graph together with a non-empty set of processes
/// that wake up spontaneously.
pub fn graph_with_initiators(max_processes: u32) -> impl Strategy<Value = (Graph, Vec<ProcessId>)> {
    connected_graph(max_processes).prop_flat_map(|graph| {
        let processes: Vec<_> = graph.processes().into_iter().collect();
        let len = processes.len();
        let initiators = prop::sample::subsequence(processes, 1..=len);
        (Just(graph), initiators)
    })
}

/// Generate a node state carried by `Initiate`.
pub fn search_state() -> impl Strategy<Value = NodeState> {
    prop_oneof![Just(NodeState::Find), Just(NodeState::Found)]
}

/// Generate a payload with small levels and weights.
pub fn payload() -> impl Strategy<Value = Payload> {
    let level = (0u32..8).prop_map(Level);
    let weight = prop_oneof![
        (1u64..64).prop_map(Weight),
        Just(Weight::INFINITY),
    ];
    prop_oneof![
        level.clone().prop_map(|level| Payload::Connect { level }),
        (level.clone(), 1u64..64, search_state()).prop_map(|(level, f, state)| {
            Payload::Initiate {
                level,
                fragment: FragmentId(f),
                state,
            }
        }),
        (level, 1u64..64).prop_map(|(level, f)| Payload::Test {
            level,
            fragment: FragmentId(f),
        }),
        Just(Payload::Reject),
        Just(Payload::Accept),
        weight.prop_map(|weight| Payload::Report { weight }),
        Just(Payload::ChangeCore),
    ]
}

/// Generate a message from a sender in `1..=max_source`.
pub fn message(max_source: u32) -> impl Strategy<Value = Message> {
    (1..=max_source.max(1), payload()).prop_map(|(s, p)| Message::new(ProcessId(s), p))
}
