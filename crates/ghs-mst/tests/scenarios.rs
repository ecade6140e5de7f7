//! End-to-end protocol scenarios over the simulated network.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use ghs_mst::core::{
    Dispatcher, EdgeState, FragmentId, Level, Message, NodeState, Payload, ProcessId,
    ProcessState, Weight,
};
use ghs_mst::Topology;
use ghs_mst_testkit::generators::{connected_graph, graph_with_initiators, message};
use ghs_mst_testkit::simulation::{DeliveryOrder, SimOutcome, Simulation};
use ghs_mst_testkit::{line, star, tie_break, triangle, Graph};

const MAX_STEPS: usize = 100_000;

fn run(graph: &Graph, order: DeliveryOrder, initiators: &[ProcessId]) -> (SimOutcome, Simulation) {
    let mut sim = Simulation::new(graph).unwrap().with_order(order);
    sim.wake_all(initiators).unwrap();
    let outcome = sim.run(MAX_STEPS);
    (outcome, sim)
}

fn link_states(outcome: &SimOutcome, id: u32) -> Vec<(Weight, EdgeState)> {
    outcome.summaries[&ProcessId(id)]
        .links
        .iter()
        .map(|&(_, w, s)| (w, s))
        .collect()
}

/// Weights of the links each process sent `Test` on, in send order.
fn tests_sent(sim: &Simulation, graph: &Graph) -> BTreeMap<ProcessId, Vec<Weight>> {
    let mut probes: BTreeMap<ProcessId, Vec<Weight>> = BTreeMap::new();
    for sent in sim.sent() {
        if let Payload::Test { .. } = sent.message.payload {
            let weight = graph.edge_between(sent.from, sent.to).unwrap();
            probes.entry(sent.from).or_default().push(weight);
        }
    }
    probes
}

#[test]
fn test_triangle_builds_minimum_spanning_tree() {
    let graph = triangle();
    let (outcome, _) = run(&graph, DeliveryOrder::Fifo, &[graph.initiator]);

    assert_eq!(outcome.in_flight, 0);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
    assert!(outcome.all_found());

    assert_eq!(
        link_states(&outcome, 1),
        vec![(Weight(3), EdgeState::Branch), (Weight(5), EdgeState::Branch)]
    );
    assert_eq!(
        link_states(&outcome, 2),
        vec![(Weight(5), EdgeState::Branch), (Weight(7), EdgeState::Rejected)]
    );
    assert_eq!(
        link_states(&outcome, 3),
        vec![(Weight(3), EdgeState::Branch), (Weight(7), EdgeState::Rejected)]
    );

    // The level-1 core is the weight-3 edge and nothing ever moves it.
    assert_eq!(outcome.halted, BTreeSet::from([ProcessId(1), ProcessId(3)]));
    for id in [1, 2, 3] {
        let summary = &outcome.summaries[&ProcessId(id)];
        assert_eq!(summary.level, Level(1));
        assert_eq!(summary.fragment, Some(FragmentId(3)));
    }
}

#[test]
fn test_first_probe_uses_lowest_basic_link() {
    // Process 1 with neighbours on weights 5, 2 and 8, all undecided, joins a
    // fragment through the weight-8 link.
    let graph = tie_break();
    let links = graph.links_for(ProcessId(1)).unwrap();
    let mut dispatcher = Dispatcher::new(ProcessState::new(ProcessId(1), links));

    let step = dispatcher.dispatch(Message::new(
        ProcessId(4),
        Payload::Initiate {
            level: Level(1),
            fragment: FragmentId(8),
            state: NodeState::Find,
        },
    ));

    assert_eq!(step.outgoing.len(), 1);
    assert_eq!(step.outgoing[0].to, ProcessId(3));
    assert_eq!(
        step.outgoing[0].message.payload,
        Payload::Test {
            level: Level(1),
            fragment: FragmentId(8)
        }
    );
}

#[test]
fn test_probes_never_go_back_to_cheaper_links() {
    let graph = tie_break();
    let (outcome, sim) = run(&graph, DeliveryOrder::Fifo, &[graph.initiator]);
    assert_eq!(outcome.tree_weights(), graph.minimum_spanning_tree());

    let probes = tests_sent(&sim, &graph);
    assert!(!probes.is_empty());
    for (id, weights) in probes {
        assert!(
            weights.windows(2).all(|w| w[0] <= w[1]),
            "process {id} probed {weights:?}"
        );
    }
}

#[test]
fn test_star_deferred_connects_are_released() {
    let graph = star();
    let everyone: Vec<_> = graph.processes().into_iter().collect();
    let (outcome, _) = run(&graph, DeliveryOrder::Fifo, &everyone);

    assert_eq!(outcome.in_flight, 0);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.tree_weights(), graph.minimum_spanning_tree());
    assert!(outcome.all_found());

    // The leaves on weights 2, 3 and 4 connect before the centre reaches
    // level 1; each Connect waits once and is then absorbed.
    let centre = outcome.stats[&ProcessId(1)];
    assert!(centre.deferred >= 3, "{centre:?}");
    assert_eq!(centre.retried, centre.deferred);
    assert!(outcome.max_defer_cycles() <= 2);
    assert_eq!(
        link_states(&outcome, 1)
            .into_iter()
            .filter(|(_, s)| *s == EdgeState::Branch)
            .count(),
        4
    );
}

#[test]
fn test_termination_halts_exactly_the_core() {
    let graph = line(6);
    let (outcome, mut sim) = run(&graph, DeliveryOrder::Fifo, &[graph.initiator]);

    assert_eq!(outcome.halted.len(), 2);
    let core: Vec<_> = outcome.halted.iter().copied().collect();
    let core_weight = graph.edge_between(core[0], core[1]);
    assert!(core_weight.is_some(), "halted processes {core:?} are not adjacent");
    assert!(outcome.tree_weights().contains(&core_weight.unwrap()));

    // Nothing further is accepted by the halted processes.
    let before = outcome.stats[&core[0]];
    sim.inject(core[0], Message::new(core[1], Payload::ChangeCore));
    let after = sim.run(10);
    assert_eq!(after.stats[&core[0]].dropped, before.dropped + 1);
    assert!(after.violations.is_empty());
}

#[test]
fn test_message_from_stranger_changes_nothing() {
    let graph = triangle();
    let mut sim = Simulation::new(&graph).unwrap();
    sim.inject(
        ProcessId(2),
        Message::new(ProcessId(9), Payload::Report { weight: Weight(1) }),
    );
    let outcome = sim.run(10);

    assert_eq!(outcome.stats[&ProcessId(2)].dropped, 1);
    assert_eq!(
        outcome.summaries[&ProcessId(2)].node_state,
        NodeState::Sleeping
    );
    assert_eq!(outcome.failures.len(), 1);
}

#[test]
fn test_topology_file_round_trips_generated_graph() {
    let graph = tie_break();
    let topology = Topology::parse(&graph.to_topology_text()).unwrap();
    assert_eq!(topology.initiator(), graph.initiator);
    for id in graph.processes() {
        let from_file: Vec<_> = topology
            .links_for(id)
            .iter()
            .map(|(_, l)| (l.neighbor(), l.weight()))
            .collect();
        let from_graph: Vec<_> = graph
            .links_for(id)
            .unwrap()
            .iter()
            .map(|(_, l)| (l.neighbor(), l.weight()))
            .collect();
        assert_eq!(from_file, from_graph);
    }
}

fn assert_converged(graph: &Graph, outcome: &SimOutcome) -> Result<(), TestCaseError> {
    prop_assert_eq!(outcome.in_flight, 0);
    prop_assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    prop_assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
    prop_assert_eq!(outcome.tree_weights(), graph.minimum_spanning_tree());
    prop_assert!(outcome.disagreements().is_empty(), "{:?}", outcome.disagreements());
    prop_assert!(outcome.all_found());
    prop_assert_eq!(outcome.halted.len(), 2);
    for summary in outcome.summaries.values() {
        prop_assert!(summary.links.iter().all(|(_, _, s)| *s != EdgeState::Basic));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn single_initiator_finds_the_mst(graph in connected_graph(8)) {
        let (outcome, _) = run(&graph, DeliveryOrder::Fifo, &[graph.initiator]);
        assert_converged(&graph, &outcome)?;
    }

    #[test]
    fn any_interleaving_finds_the_mst(
        (graph, initiators) in graph_with_initiators(8),
        seed in any::<u64>(),
    ) {
        let (outcome, sim) = run(&graph, DeliveryOrder::Random(seed), &initiators);
        assert_converged(&graph, &outcome)?;

        for (id, weights) in tests_sent(&sim, &graph) {
            prop_assert!(weights.windows(2).all(|w| w[0] <= w[1]), "process {} probed {:?}", id, weights);
        }
    }

    #[test]
    fn arbitrary_messages_never_panic(messages in prop::collection::vec(message(6), 0..64)) {
        let graph = line(4);
        let mut dispatcher = Dispatcher::new(ProcessState::new(
            ProcessId(2),
            graph.links_for(ProcessId(2)).unwrap(),
        ));
        let mut unknown = 0;
        for msg in messages {
            if msg.source != ProcessId(1) && msg.source != ProcessId(3) {
                unknown += 1;
            }
            dispatcher.dispatch(msg);
        }
        prop_assert!(dispatcher.stats().dropped >= unknown);
    }
}
