//! Links: one per adjacent process.
//!
//! A process keeps its links in a [`Links`] arena sorted ascending by weight.
//! Handlers refer to links by [`LinkId`], never by reference into an
//! iteration, so a selected candidate can't alias a loop variable.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::message::{Message, NodeState, Outgoing, Payload};
use crate::types::{FragmentId, Level, LinkId, ProcessId, Weight};

/// Classification of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeState {
    /// Not yet decided.
    Basic,
    /// Part of the minimum spanning tree.
    Branch,
    /// Not part of the minimum spanning tree.
    Rejected,
}

/// An edge to a neighbouring process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    neighbor: ProcessId,
    weight: Weight,
    state: EdgeState,
}

impl Link {
    /// Create an undecided link.
    pub fn new(neighbor: ProcessId, weight: Weight) -> Self {
        Self {
            neighbor,
            weight,
            state: EdgeState::Basic,
        }
    }

    pub fn neighbor(&self) -> ProcessId {
        self.neighbor
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn state(&self) -> EdgeState {
        self.state
    }

    pub fn is_basic(&self) -> bool {
        self.state == EdgeState::Basic
    }

    pub fn is_branch(&self) -> bool {
        self.state == EdgeState::Branch
    }

    /// Move the link to `to`.
    ///
    /// Only `Basic -> Branch` and `Basic -> Rejected` are allowed; setting the
    /// current state again is a no-op.
    pub fn classify(&mut self, to: EdgeState) -> Result<()> {
        match (self.state, to) {
            (from, to) if from == to => Ok(()),
            (EdgeState::Basic, EdgeState::Branch | EdgeState::Rejected) => {
                self.state = to;
                Ok(())
            }
            (from, to) => Err(CoreError::IllegalTransition {
                weight: self.weight,
                from,
                to,
            }),
        }
    }

    fn outgoing(&self, from: ProcessId, payload: Payload) -> Outgoing {
        Outgoing {
            to: self.neighbor,
            message: Message::new(from, payload),
        }
    }

    pub fn connect(&self, from: ProcessId, level: Level) -> Outgoing {
        self.outgoing(from, Payload::Connect { level })
    }

    pub fn initiate(
        &self,
        from: ProcessId,
        level: Level,
        fragment: FragmentId,
        state: NodeState,
    ) -> Outgoing {
        self.outgoing(
            from,
            Payload::Initiate {
                level,
                fragment,
                state,
            },
        )
    }

    pub fn test(&self, from: ProcessId, level: Level, fragment: FragmentId) -> Outgoing {
        self.outgoing(from, Payload::Test { level, fragment })
    }

    pub fn reject(&self, from: ProcessId) -> Outgoing {
        self.outgoing(from, Payload::Reject)
    }

    pub fn accept(&self, from: ProcessId) -> Outgoing {
        self.outgoing(from, Payload::Accept)
    }

    pub fn report(&self, from: ProcessId, weight: Weight) -> Outgoing {
        self.outgoing(from, Payload::Report { weight })
    }

    pub fn change_core(&self, from: ProcessId) -> Outgoing {
        self.outgoing(from, Payload::ChangeCore)
    }
}

/// Fixed arena of a process's links, sorted ascending by weight.
///
/// The ordering is load-bearing: [`Links::first_basic`] is the lowest-weight
/// undecided edge, which is the one the search probes next.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Links {
    links: Vec<Link>,
}

impl Links {
    /// Build the arena from links in any order.
    pub fn new(mut links: Vec<Link>) -> Result<Self> {
        links.sort_by_key(|l| l.weight);
        for (i, link) in links.iter().enumerate() {
            if links[..i].iter().any(|l| l.neighbor == link.neighbor) {
                return Err(CoreError::DuplicateNeighbor(link.neighbor));
            }
        }
        Ok(Self { links })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Get a link by id.
    ///
    /// Ids are only ever produced by this arena, so they are always in range.
    pub fn get(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: LinkId) -> &mut Link {
        &mut self.links[id.0]
    }

    /// Resolve a neighbour to its link.
    pub fn find_by_neighbor(&self, neighbor: ProcessId) -> Option<LinkId> {
        self.links
            .iter()
            .position(|l| l.neighbor == neighbor)
            .map(LinkId)
    }

    /// Lowest-weight link still in `Basic`.
    pub fn first_basic(&self) -> Option<LinkId> {
        self.links.iter().position(Link::is_basic).map(LinkId)
    }

    /// Iterate over all links with their ids, in weight order.
    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    /// Ids of all `Branch` links, in weight order.
    pub fn branch_ids(&self) -> Vec<LinkId> {
        self.iter()
            .filter(|(_, l)| l.is_branch())
            .map(|(id, _)| id)
            .collect()
    }

    /// Weights of all `Branch` links, in ascending order.
    pub fn branch_weights(&self) -> Vec<Weight> {
        self.links
            .iter()
            .filter(|l| l.is_branch())
            .map(|l| l.weight)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn links(weights: &[(u32, u64)]) -> Links {
        Links::new(
            weights
                .iter()
                .map(|&(n, w)| Link::new(ProcessId(n), Weight(w)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_links_sorted_by_weight() {
        let links = links(&[(2, 5), (3, 2), (4, 8)]);
        let weights: Vec<_> = links.iter().map(|(_, l)| l.weight().0).collect();
        assert_eq!(weights, vec![2, 5, 8]);

        let first = links.first_basic().unwrap();
        assert_eq!(links.get(first).neighbor(), ProcessId(3));
    }

    #[test]
    fn test_duplicate_neighbor_rejected() {
        let result = Links::new(vec![
            Link::new(ProcessId(2), Weight(1)),
            Link::new(ProcessId(2), Weight(4)),
        ]);
        assert!(matches!(result, Err(CoreError::DuplicateNeighbor(ProcessId(2)))));
    }

    #[test]
    fn test_find_by_neighbor() {
        let links = links(&[(7, 10), (9, 3)]);
        let id = links.find_by_neighbor(ProcessId(7)).unwrap();
        assert_eq!(links.get(id).weight(), Weight(10));
        assert!(links.find_by_neighbor(ProcessId(1)).is_none());
    }

    #[test]
    fn test_classification_is_monotonic() {
        let mut link = Link::new(ProcessId(1), Weight(4));
        link.classify(EdgeState::Branch).unwrap();
        link.classify(EdgeState::Branch).unwrap();
        assert!(link.classify(EdgeState::Rejected).is_err());
        assert!(link.classify(EdgeState::Basic).is_err());
        assert_eq!(link.state(), EdgeState::Branch);

        let mut link = Link::new(ProcessId(1), Weight(5));
        link.classify(EdgeState::Rejected).unwrap();
        assert!(link.classify(EdgeState::Branch).is_err());
        assert_eq!(link.state(), EdgeState::Rejected);
    }

    #[test]
    fn test_first_basic_skips_decided() {
        let mut links = links(&[(2, 1), (3, 2), (4, 3)]);
        links.get_mut(LinkId(0)).classify(EdgeState::Branch).unwrap();
        links.get_mut(LinkId(1)).classify(EdgeState::Rejected).unwrap();
        assert_eq!(links.first_basic(), Some(LinkId(2)));
        assert_eq!(links.branch_weights(), vec![Weight(1)]);
    }

    #[test]
    fn test_link_messages_carry_sender() {
        let link = Link::new(ProcessId(9), Weight(3));
        let out = link.connect(ProcessId(1), Level(2));
        assert_eq!(out.to, ProcessId(9));
        assert_eq!(out.message.source, ProcessId(1));
        assert_eq!(out.message.payload, Payload::Connect { level: Level(2) });
    }

    fn edge_state() -> impl Strategy<Value = EdgeState> {
        prop_oneof![
            Just(EdgeState::Basic),
            Just(EdgeState::Branch),
            Just(EdgeState::Rejected),
        ]
    }

    proptest! {
        #[test]
        fn test_classification_never_leaves_a_decision(
            targets in prop::collection::vec(edge_state(), 1..16),
        ) {
            let mut link = Link::new(ProcessId(1), Weight(1));
            let mut decided: Option<EdgeState> = None;
            for to in targets {
                let result = link.classify(to);
                match decided {
                    None if to == EdgeState::Basic => prop_assert!(result.is_ok()),
                    None => {
                        prop_assert!(result.is_ok());
                        decided = Some(to);
                    }
                    Some(state) => prop_assert_eq!(result.is_ok(), to == state),
                }
                prop_assert_eq!(link.state(), decided.unwrap_or(EdgeState::Basic));
            }
        }

        #[test]
        fn test_links_sorted_for_any_input_order(
            weights in prop::collection::btree_set(0u64..1_000, 1..12),
            seed in any::<u64>(),
        ) {
            let mut input: Vec<Link> = weights
                .iter()
                .enumerate()
                .map(|(i, &w)| Link::new(ProcessId(i as u32 + 2), Weight(w)))
                .collect();
            let len = input.len();
            input.rotate_left((seed % len as u64) as usize);
            if seed & 1 == 1 {
                input.reverse();
            }

            let links = Links::new(input).unwrap();
            let sorted: Vec<Weight> = links.iter().map(|(_, l)| l.weight()).collect();
            let expected: Vec<Weight> = weights.iter().copied().map(Weight).collect();
            prop_assert_eq!(sorted, expected);
            for (id, link) in links.iter() {
                prop_assert_eq!(links.find_by_neighbor(link.neighbor()), Some(id));
            }
        }
    }
}
