//! Deterministic in-process network.
//!
//! Every process is a core [`Dispatcher`]; every directed link is a FIFO
//! queue. One step delivers one message to completion. Time is logical:
//! the only nondeterminism is the choice of which link to deliver from,
//! and that comes from [`DeliveryOrder`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ghs_mst_core::{
    CoreError, DispatchStats, Dispatcher, EdgeState, Message, NodeState, ProcessId, ProcessState,
    ProcessSummary, Step, Weight,
};

use crate::graph::Graph;

/// Which in-flight message is delivered next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOrder {
    /// Global send order.
    Fifo,
    /// The head of a uniformly chosen non-empty link. Per-link order is kept.
    Random(u64),
}

/// A message that has been sent, in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub from: ProcessId,
    pub to: ProcessId,
    pub message: Message,
}

/// Result of a simulation run.
#[derive(Debug)]
pub struct SimOutcome {
    pub summaries: BTreeMap<ProcessId, ProcessSummary>,
    pub stats: BTreeMap<ProcessId, DispatchStats>,
    /// Processes that detected termination.
    pub halted: BTreeSet<ProcessId>,
    /// Messages delivered.
    pub delivered: usize,
    /// Messages still queued when the run stopped.
    pub in_flight: usize,
    /// Handler failures, by receiving process.
    pub failures: Vec<(ProcessId, CoreError)>,
    /// Edge classifications that moved backwards or sideways.
    pub violations: Vec<String>,
}

impl SimOutcome {
    /// Union of the `Branch` weights seen by every process.
    pub fn tree_weights(&self) -> BTreeSet<Weight> {
        self.summaries
            .values()
            .flat_map(|s| s.branch_weights())
            .collect()
    }

    /// Weights of edges whose two endpoints classify them differently.
    pub fn disagreements(&self) -> Vec<Weight> {
        let mut views: BTreeMap<Weight, Vec<EdgeState>> = BTreeMap::new();
        for summary in self.summaries.values() {
            for &(_, weight, state) in &summary.links {
                views.entry(weight).or_default().push(state);
            }
        }
        views
            .into_iter()
            .filter(|(_, states)| states.windows(2).any(|w| w[0] != w[1]))
            .map(|(weight, _)| weight)
            .collect()
    }

    /// Whether every process ended in `Found`.
    pub fn all_found(&self) -> bool {
        self.summaries
            .values()
            .all(|s| s.node_state == NodeState::Found)
    }

    /// Largest number of times any message was deferred.
    pub fn max_defer_cycles(&self) -> u32 {
        self.stats
            .values()
            .map(|s| s.max_defer_cycles)
            .max()
            .unwrap_or(0)
    }
}

/// Simulated network of dispatchers.
pub struct Simulation {
    processes: BTreeMap<ProcessId, Dispatcher>,
    /// `(from, to)` to the messages in flight on that directed link.
    links: BTreeMap<(ProcessId, ProcessId), VecDeque<Message>>,
    /// Links in send order, one entry per message (only for `Fifo`).
    send_order: VecDeque<(ProcessId, ProcessId)>,
    order: DeliveryOrder,
    rng: StdRng,
    sent: Vec<Sent>,
    delivered: usize,
    failures: Vec<(ProcessId, CoreError)>,
    violations: Vec<String>,
}

impl Simulation {
    /// One sleeping process per vertex of `graph`.
    pub fn new(graph: &Graph) -> Result<Self, CoreError> {
        let processes = graph
            .processes()
            .into_iter()
            .map(|id| -> Result<_, CoreError> {
                let links = graph.links_for(id)?;
                Ok((id, Dispatcher::new(ProcessState::new(id, links))))
            })
            .collect::<Result<_, CoreError>>()?;
        Ok(Self {
            processes,
            links: BTreeMap::new(),
            send_order: VecDeque::new(),
            order: DeliveryOrder::Fifo,
            rng: StdRng::seed_from_u64(0),
            sent: Vec::new(),
            delivered: 0,
            failures: Vec::new(),
            violations: Vec::new(),
        })
    }

    pub fn with_order(mut self, order: DeliveryOrder) -> Self {
        if let DeliveryOrder::Random(seed) = order {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.order = order;
        self
    }

    /// Spontaneously wake `id` up.
    pub fn wake(&mut self, id: ProcessId) -> Result<(), CoreError> {
        let dispatcher = self
            .processes
            .get_mut(&id)
            .ok_or(CoreError::UnknownSender(id))?;
        let step = dispatcher.wakeup()?;
        self.enqueue(id, step);
        Ok(())
    }

    /// Wake every process in `ids`, in order.
    pub fn wake_all(&mut self, ids: &[ProcessId]) -> Result<(), CoreError> {
        ids.iter().try_for_each(|&id| self.wake(id))
    }

    /// Inject a message as if `from` had sent it to `to`.
    pub fn inject(&mut self, to: ProcessId, message: Message) {
        self.push(message.source, to, message);
    }

    /// Every message sent so far, in send order.
    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    pub fn state(&self, id: ProcessId) -> Option<&ProcessState> {
        self.processes.get(&id).map(Dispatcher::state)
    }

    pub fn in_flight(&self) -> usize {
        self.links.values().map(VecDeque::len).sum()
    }

    /// Deliver one message. Returns false once nothing is in flight.
    pub fn step(&mut self) -> bool {
        let Some((from, to)) = self.next_link() else {
            return false;
        };
        let Some(message) = self.links.get_mut(&(from, to)).and_then(VecDeque::pop_front) else {
            return false;
        };
        self.delivered += 1;

        let Some(dispatcher) = self.processes.get_mut(&to) else {
            self.failures.push((to, CoreError::UnknownSender(from)));
            return true;
        };
        let before = link_states(dispatcher.state());
        let step = dispatcher.dispatch(message);
        let after = link_states(dispatcher.state());
        for ((neighbor, was), (_, now)) in before.into_iter().zip(after) {
            if was != now && was != EdgeState::Basic {
                self.violations.push(format!(
                    "process {to}: link to {neighbor} moved from {was:?} to {now:?} on {message}"
                ));
            }
        }
        self.enqueue(to, step);
        true
    }

    /// Deliver until quiescent or `max_steps` deliveries have happened.
    pub fn run(&mut self, max_steps: usize) -> SimOutcome {
        let mut steps = 0;
        while steps < max_steps && self.step() {
            steps += 1;
        }
        self.outcome()
    }

    /// Snapshot the current state.
    pub fn outcome(&mut self) -> SimOutcome {
        let summaries: BTreeMap<_, _> = self
            .processes
            .iter()
            .map(|(&id, d)| (id, d.state().summary()))
            .collect();
        SimOutcome {
            halted: summaries
                .values()
                .filter(|s| s.halted)
                .map(|s| s.id)
                .collect(),
            stats: self
                .processes
                .iter()
                .map(|(&id, d)| (id, d.stats()))
                .collect(),
            summaries,
            delivered: self.delivered,
            in_flight: self.in_flight(),
            failures: std::mem::take(&mut self.failures),
            violations: std::mem::take(&mut self.violations),
        }
    }

    fn enqueue(&mut self, from: ProcessId, step: Step) {
        for failure in step.failures {
            self.failures.push((from, failure));
        }
        for out in step.outgoing {
            self.push(from, out.to, out.message);
        }
    }

    fn push(&mut self, from: ProcessId, to: ProcessId, message: Message) {
        self.sent.push(Sent { from, to, message });
        self.links.entry((from, to)).or_default().push_back(message);
        if self.order == DeliveryOrder::Fifo {
            self.send_order.push_back((from, to));
        }
    }

    fn next_link(&mut self) -> Option<(ProcessId, ProcessId)> {
        match self.order {
            DeliveryOrder::Fifo => self.send_order.pop_front(),
            DeliveryOrder::Random(_) => {
                let ready: Vec<_> = self
                    .links
                    .iter()
                    .filter(|(_, queue)| !queue.is_empty())
                    .map(|(&key, _)| key)
                    .collect();
                if ready.is_empty() {
                    None
                } else {
                    Some(ready[self.rng.gen_range(0..ready.len())])
                }
            }
        }
    }
}

fn link_states(state: &ProcessState) -> Vec<(ProcessId, EdgeState)> {
    state
        .links()
        .iter()
        .map(|(_, link)| (link.neighbor(), link.state()))
        .collect()
}
