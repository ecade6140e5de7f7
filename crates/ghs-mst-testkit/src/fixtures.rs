//! Named graphs shared by the test suites.

use crate::graph::Graph;

/// Three processes; the tree is `{3, 5}` and the weight-7 edge is rejected.
pub fn triangle() -> Graph {
    Graph::new(1, &[(1, 2, 5), (1, 3, 3), (2, 3, 7)])
}

/// Process 1 in the centre with four leaves on weights 1 to 4.
///
/// Waking every process at once makes the centre receive Connects at a
/// level it has not reached yet.
pub fn star() -> Graph {
    Graph::new(1, &[(1, 2, 1), (1, 3, 2), (1, 4, 3), (1, 5, 4)])
}

/// Process 1 with links of weight 5, 2 and 8, listed out of order, and a
/// cycle among the neighbours so that edges get rejected.
pub fn tie_break() -> Graph {
    Graph::new(
        1,
        &[(1, 2, 5), (1, 3, 2), (1, 4, 8), (2, 3, 9), (3, 4, 11)],
    )
}

/// A path `1 - 2 - ... - n` with weights `1..n`.
pub fn line(n: u32) -> Graph {
    let edges: Vec<_> = (1..n).map(|i| (i, i + 1, u64::from(i))).collect();
    Graph::new(1, &edges)
}
