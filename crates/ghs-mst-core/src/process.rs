//! Per-process state machine.
//!
//! Every handler runs to completion on the single logical owner of the
//! process, appends its outbound messages to the outbox, and tells the caller
//! whether the message was consumed, must be deferred, or ended the
//! algorithm.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispatch::Eligibility;
use crate::error::{CoreError, Result};
use crate::link::{EdgeState, Links};
use crate::message::{NodeState, Outgoing};
use crate::types::{FragmentId, Level, LinkId, ProcessId, Weight};

/// Outcome of a handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The message was consumed.
    Done,
    /// The message arrived too early and must be retried once the condition holds.
    Deferred(Eligibility),
    /// No outgoing edge exists anywhere: the algorithm is over.
    Halted,
}

/// Serializable view of a process, used in event logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: ProcessId,
    pub node_state: NodeState,
    pub level: Level,
    pub fragment: Option<FragmentId>,
    pub best_weight: Weight,
    pub pending_responses: u32,
    pub halted: bool,
    /// `(neighbour, weight, classification)` for every link, in weight order.
    pub links: Vec<(ProcessId, Weight, EdgeState)>,
}

impl ProcessSummary {
    /// Weights of the links classified `Branch`.
    pub fn branch_weights(&self) -> Vec<Weight> {
        self.links
            .iter()
            .filter(|(_, _, s)| *s == EdgeState::Branch)
            .map(|(_, w, _)| *w)
            .collect()
    }
}

/// State of one process.
#[derive(Debug, Clone)]
pub struct ProcessState {
    id: ProcessId,
    node_state: NodeState,
    level: Level,
    fragment: Option<FragmentId>,
    test_edge: Option<LinkId>,
    best_edge: Option<LinkId>,
    best_weight: Weight,
    in_branch: Option<LinkId>,
    /// Children whose report is still outstanding.
    pending_responses: u32,
    links: Links,
    halted: bool,
    outbox: Vec<Outgoing>,
}

impl ProcessState {
    /// Create a sleeping process.
    pub fn new(id: ProcessId, links: Links) -> Self {
        Self {
            id,
            node_state: NodeState::Sleeping,
            level: Level::ZERO,
            fragment: None,
            test_edge: None,
            best_edge: None,
            best_weight: Weight::INFINITY,
            in_branch: None,
            pending_responses: 0,
            links,
            halted: false,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn node_state(&self) -> NodeState {
        self.node_state
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn fragment(&self) -> Option<FragmentId> {
        self.fragment
    }

    pub fn best_weight(&self) -> Weight {
        self.best_weight
    }

    pub fn pending_responses(&self) -> u32 {
        self.pending_responses
    }

    pub fn test_edge(&self) -> Option<LinkId> {
        self.test_edge
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Take every message queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            id: self.id,
            node_state: self.node_state,
            level: self.level,
            fragment: self.fragment,
            best_weight: self.best_weight,
            pending_responses: self.pending_responses,
            halted: self.halted,
            links: self
                .links
                .iter()
                .map(|(_, l)| (l.neighbor(), l.weight(), l.state()))
                .collect(),
        }
    }

    fn send(&mut self, out: Outgoing) {
        debug!(process = %self.id, to = %out.to, message = %out.message, "send");
        self.outbox.push(out);
    }

    fn set_node_state(&mut self, state: NodeState) {
        if self.node_state != state {
            info!(process = %self.id, from = %self.node_state, to = %state, "node state");
            self.node_state = state;
        }
    }

    fn classify(&mut self, link: LinkId, to: EdgeState) -> Result<()> {
        let entry = self.links.get_mut(link);
        let from = entry.state();
        entry.classify(to)?;
        if from != to {
            info!(
                process = %self.id,
                neighbor = %entry.neighbor(),
                weight = %entry.weight(),
                ?to,
                "edge classified"
            );
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wakeup
    // ─────────────────────────────────────────────────────────────────────────

    /// Wake up a sleeping process as a one-process fragment.
    ///
    /// Marks the minimum-weight link `Branch` and proposes a merge on it.
    /// Does nothing if the process is already awake.
    pub fn wakeup(&mut self) -> Result<()> {
        if self.node_state != NodeState::Sleeping {
            return Ok(());
        }
        let min = self.links.first_basic().ok_or(CoreError::Isolated(self.id))?;
        self.classify(min, EdgeState::Branch)?;
        self.level = Level::ZERO;
        self.set_node_state(NodeState::Found);
        self.pending_responses = 0;
        let out = self.links.get(min).connect(self.id, Level::ZERO);
        self.send(out);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merging
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle `Connect(level)` received on `j`.
    pub fn on_connect(&mut self, level: Level, j: LinkId) -> Result<Handled> {
        self.wakeup()?;

        if level < self.level {
            // Absorb the lower-level fragment.
            self.classify(j, EdgeState::Branch)?;
            let out = self.links.get(j).initiate(
                self.id,
                self.level,
                self.current_fragment(),
                self.node_state,
            );
            self.send(out);
            if self.node_state == NodeState::Find {
                self.pending_responses += 1;
            }
            Ok(Handled::Done)
        } else if self.links.get(j).is_basic() {
            Ok(Handled::Deferred(Eligibility::Absorbable { level, link: j }))
        } else {
            // Both ends chose this edge at the same level: it becomes the new core.
            let link = self.links.get(j);
            let out = link.initiate(
                self.id,
                self.level.next(),
                FragmentId::from(link.weight()),
                NodeState::Find,
            );
            self.send(out);
            Ok(Handled::Done)
        }
    }

    /// Handle `Initiate(level, fragment, state)` received on `j`.
    pub fn on_initiate(
        &mut self,
        level: Level,
        fragment: FragmentId,
        state: NodeState,
        j: LinkId,
    ) -> Result<Handled> {
        if level != self.level || self.fragment != Some(fragment) {
            info!(process = %self.id, %level, %fragment, "joined fragment");
        }
        self.level = level;
        self.fragment = Some(fragment);
        self.set_node_state(state);
        self.in_branch = Some(j);
        self.best_edge = None;
        self.best_weight = Weight::INFINITY;

        for i in self.links.branch_ids() {
            if i == j {
                continue;
            }
            let out = self.links.get(i).initiate(self.id, level, fragment, state);
            self.send(out);
            if state == NodeState::Find {
                self.pending_responses += 1;
            }
        }

        if state == NodeState::Find {
            self.test()?;
        }
        Ok(Handled::Done)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Minimum outgoing edge search
    // ─────────────────────────────────────────────────────────────────────────

    /// Probe the lowest-weight undecided link, or report if none is left.
    pub fn test(&mut self) -> Result<()> {
        match self.links.first_basic() {
            Some(candidate) => {
                self.test_edge = Some(candidate);
                let out = self
                    .links
                    .get(candidate)
                    .test(self.id, self.level, self.current_fragment());
                self.send(out);
                Ok(())
            }
            None => {
                self.test_edge = None;
                self.report()
            }
        }
    }

    /// Handle `Test(level, fragment)` received on `j`.
    pub fn on_test(&mut self, level: Level, fragment: FragmentId, j: LinkId) -> Result<Handled> {
        self.wakeup()?;

        if level > self.level {
            return Ok(Handled::Deferred(Eligibility::LevelAtLeast(level)));
        }

        if self.fragment != Some(fragment) {
            let out = self.links.get(j).accept(self.id);
            self.send(out);
            return Ok(Handled::Done);
        }

        // Same fragment: the edge is internal.
        if self.links.get(j).is_basic() {
            self.classify(j, EdgeState::Rejected)?;
        }
        if self.test_edge != Some(j) {
            let out = self.links.get(j).reject(self.id);
            self.send(out);
        } else {
            self.test()?;
        }
        Ok(Handled::Done)
    }

    /// Handle `Accept` received on `j`.
    pub fn on_accept(&mut self, j: LinkId) -> Result<Handled> {
        self.test_edge = None;
        let weight = self.links.get(j).weight();
        if weight < self.best_weight {
            self.best_edge = Some(j);
            self.best_weight = weight;
        }
        self.report()?;
        Ok(Handled::Done)
    }

    /// Handle `Reject` received on `j`.
    pub fn on_reject(&mut self, j: LinkId) -> Result<Handled> {
        if self.links.get(j).is_basic() {
            self.classify(j, EdgeState::Rejected)?;
        }
        self.test()?;
        Ok(Handled::Done)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────────────────────

    /// Report the best candidate toward the core once every child has
    /// answered and local probing is finished.
    pub fn report(&mut self) -> Result<()> {
        if self.pending_responses != 0 || self.test_edge.is_some() {
            return Ok(());
        }
        let in_branch = self.in_branch.ok_or(CoreError::NoInBranch)?;
        self.set_node_state(NodeState::Found);
        let out = self.links.get(in_branch).report(self.id, self.best_weight);
        self.send(out);
        Ok(())
    }

    /// Handle `Report(weight)` received on `j`.
    pub fn on_report(&mut self, weight: Weight, j: LinkId) -> Result<Handled> {
        if Some(j) != self.in_branch {
            self.pending_responses = self
                .pending_responses
                .checked_sub(1)
                .ok_or(CoreError::PendingUnderflow)?;
            if weight < self.best_weight {
                self.best_weight = weight;
                self.best_edge = Some(j);
            }
            self.report()?;
            return Ok(Handled::Done);
        }

        // Report across the core edge.
        if self.node_state == NodeState::Find {
            return Ok(Handled::Deferred(Eligibility::SearchFinished));
        }
        if weight > self.best_weight {
            self.change_core()?;
        } else if weight.is_infinite() && self.best_weight.is_infinite() {
            self.halted = true;
            info!(
                process = %self.id,
                branches = ?self.links.branch_weights(),
                "no outgoing edge left, terminating"
            );
            return Ok(Handled::Halted);
        } else if weight == self.best_weight {
            warn!(process = %self.id, %weight, "equal best weights across the core edge");
        }
        Ok(Handled::Done)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Core change
    // ─────────────────────────────────────────────────────────────────────────

    /// Move the core toward the fragment's minimum outgoing edge.
    pub fn change_core(&mut self) -> Result<()> {
        let best = self.best_edge.ok_or(CoreError::NoBestEdge)?;
        if self.links.get(best).is_branch() {
            let out = self.links.get(best).change_core(self.id);
            self.send(out);
        } else {
            self.classify(best, EdgeState::Branch)?;
            let out = self.links.get(best).connect(self.id, self.level);
            self.send(out);
        }
        Ok(())
    }

    /// Handle `ChangeCore`.
    pub fn on_change_core(&mut self) -> Result<Handled> {
        self.change_core()?;
        Ok(Handled::Done)
    }

    fn current_fragment(&self) -> FragmentId {
        // Level-0 fragments have no identifier yet; nothing compares against it
        // because tests from level 0 never happen.
        self.fragment.unwrap_or(FragmentId(0))
    }
}
