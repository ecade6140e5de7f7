//! Weighted undirected graphs and the reference minimum spanning tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use ghs_mst_core::{CoreError, Link, Links, ProcessId, Weight};

/// One undirected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub a: ProcessId,
    pub b: ProcessId,
    pub weight: Weight,
}

/// A graph plus the process that wakes up on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub initiator: ProcessId,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Build from `(a, b, weight)` triples.
    pub fn new(initiator: u32, edges: &[(u32, u32, u64)]) -> Self {
        Self {
            initiator: ProcessId(initiator),
            edges: edges
                .iter()
                .map(|&(a, b, w)| Edge {
                    a: ProcessId(a),
                    b: ProcessId(b),
                    weight: Weight(w),
                })
                .collect(),
        }
    }

    pub fn processes(&self) -> BTreeSet<ProcessId> {
        self.edges.iter().flat_map(|e| [e.a, e.b]).collect()
    }

    /// The links of `id`, sorted by weight.
    pub fn links_for(&self, id: ProcessId) -> Result<Links, CoreError> {
        let links = self
            .edges
            .iter()
            .filter_map(|e| match (e.a == id, e.b == id) {
                (true, _) => Some(Link::new(e.b, e.weight)),
                (_, true) => Some(Link::new(e.a, e.weight)),
                _ => None,
            })
            .collect();
        Links::new(links)
    }

    /// Weight of the edge between `a` and `b`, if any.
    pub fn edge_between(&self, a: ProcessId, b: ProcessId) -> Option<Weight> {
        self.edges
            .iter()
            .find(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a))
            .map(|e| e.weight)
    }

    /// Edge weights of the minimum spanning tree (forest, if disconnected),
    /// computed centrally with Kruskal's algorithm.
    pub fn minimum_spanning_tree(&self) -> BTreeSet<Weight> {
        let mut parent: BTreeMap<ProcessId, ProcessId> =
            self.processes().into_iter().map(|p| (p, p)).collect();

        fn root(parent: &mut BTreeMap<ProcessId, ProcessId>, mut p: ProcessId) -> ProcessId {
            while parent[&p] != p {
                let up = parent[&parent[&p]];
                parent.insert(p, up);
                p = up;
            }
            p
        }

        let mut edges = self.edges.clone();
        edges.sort_by_key(|e| e.weight);

        let mut tree = BTreeSet::new();
        for e in edges {
            let (ra, rb) = (root(&mut parent, e.a), root(&mut parent, e.b));
            if ra != rb {
                parent.insert(ra, rb);
                tree.insert(e.weight);
            }
        }
        tree
    }

    /// Render in the topology file format read by the node binary.
    pub fn to_topology_text(&self) -> String {
        let mut text = format!("{}\n", self.initiator);
        for e in &self.edges {
            let _ = writeln!(text, "{} {} {}", e.a, e.b, e.weight.0);
        }
        text
    }
}
