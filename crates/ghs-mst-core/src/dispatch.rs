//! Message dispatch and deferral.
//!
//! The [`Dispatcher`] is the single logical owner of a [`ProcessState`]. It
//! resolves the sender of each message to a link, runs the matching handler,
//! and parks messages that arrived too early. A parked message carries the
//! [`Eligibility`] condition under which it may be re-attempted; after every
//! message that was consumed, eligible parked messages are retried in the
//! order they were parked.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::message::{Message, NodeState, Outgoing, Payload};
use crate::process::{Handled, ProcessState};
use crate::types::{Level, LinkId};

/// Condition under which a deferred message becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// A `Connect(level)` on `link`: wait until our level exceeds `level` or
    /// the link has been classified.
    Absorbable { level: Level, link: LinkId },
    /// A `Test(level, ..)`: wait until our level catches up.
    LevelAtLeast(Level),
    /// A `Report` across the core edge: wait until our own search is over.
    SearchFinished,
}

impl Eligibility {
    /// Check the condition against the current process state.
    pub fn is_met(&self, state: &ProcessState) -> bool {
        match *self {
            Eligibility::Absorbable { level, link } => {
                state.level() > level || !state.links().get(link).is_basic()
            }
            Eligibility::LevelAtLeast(level) => state.level() >= level,
            Eligibility::SearchFinished => state.node_state() != NodeState::Find,
        }
    }
}

/// Counters describing dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Messages consumed by a handler (first attempt or retry).
    pub handled: u64,
    /// Times a message was parked.
    pub deferred: u64,
    /// Re-attempts of parked messages.
    pub retried: u64,
    /// Messages dropped: unknown sender, handler error, or after termination.
    pub dropped: u64,
    /// Largest number of times any single message has been parked.
    pub max_defer_cycles: u32,
}

/// Result of dispatching one inbound message.
#[derive(Debug, Default)]
pub struct Step {
    /// Messages to transmit, in the order they were produced.
    pub outgoing: Vec<Outgoing>,
    /// Termination was detected while handling this message.
    pub halted: bool,
    /// Errors for messages that were dropped.
    pub failures: Vec<CoreError>,
}

#[derive(Debug)]
struct Parked {
    message: Message,
    link: LinkId,
    until: Eligibility,
    cycles: u32,
}

/// Single consumer for one process's inbound messages.
#[derive(Debug)]
pub struct Dispatcher {
    state: ProcessState,
    backlog: VecDeque<Parked>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(state: ProcessState) -> Self {
        Self {
            state,
            backlog: VecDeque::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Number of messages currently parked.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }

    /// Spontaneously wake the process up.
    pub fn wakeup(&mut self) -> Result<Step> {
        self.state.wakeup()?;
        let mut step = Step::default();
        self.retry_eligible(&mut step);
        step.outgoing = self.state.take_outbox();
        Ok(step)
    }

    /// Dispatch one inbound message.
    pub fn dispatch(&mut self, message: Message) -> Step {
        let mut step = Step::default();
        debug!(process = %self.state.id(), %message, "received");

        if self.state.is_halted() {
            debug!(process = %self.state.id(), %message, "ignored after termination");
            self.stats.dropped += 1;
            return step;
        }

        match self.state.links().find_by_neighbor(message.source) {
            Some(link) => {
                if self.attempt(message, link, 0, &mut step) {
                    self.retry_eligible(&mut step);
                }
            }
            None => {
                warn!(process = %self.state.id(), %message, "dropping message from unknown sender");
                self.stats.dropped += 1;
                step.failures.push(CoreError::UnknownSender(message.source));
            }
        }

        step.outgoing = self.state.take_outbox();
        step
    }

    /// Run one handler. Returns true if the message was consumed and the
    /// process may have progressed.
    fn attempt(&mut self, message: Message, link: LinkId, cycles: u32, step: &mut Step) -> bool {
        match self.invoke(message, link) {
            Ok(Handled::Done) => {
                self.stats.handled += 1;
                true
            }
            Ok(Handled::Halted) => {
                self.stats.handled += 1;
                step.halted = true;
                false
            }
            Ok(Handled::Deferred(until)) => {
                let cycles = cycles + 1;
                debug!(process = %self.state.id(), %message, ?until, cycles, "deferred");
                self.stats.deferred += 1;
                self.stats.max_defer_cycles = self.stats.max_defer_cycles.max(cycles);
                self.backlog.push_back(Parked {
                    message,
                    link,
                    until,
                    cycles,
                });
                false
            }
            Err(e) => {
                warn!(process = %self.state.id(), %message, error = %e, "handler failed, dropping message");
                self.stats.dropped += 1;
                step.failures.push(e);
                false
            }
        }
    }

    fn retry_eligible(&mut self, step: &mut Step) {
        while !self.state.is_halted() {
            let Some(pos) = self
                .backlog
                .iter()
                .position(|p| p.until.is_met(&self.state))
            else {
                break;
            };
            let Some(parked) = self.backlog.remove(pos) else {
                break;
            };
            self.stats.retried += 1;
            self.attempt(parked.message, parked.link, parked.cycles, step);
        }
    }

    fn invoke(&mut self, message: Message, j: LinkId) -> Result<Handled> {
        match message.payload {
            Payload::Connect { level } => self.state.on_connect(level, j),
            Payload::Initiate {
                level,
                fragment,
                state,
            } => self.state.on_initiate(level, fragment, state, j),
            Payload::Test { level, fragment } => self.state.on_test(level, fragment, j),
            Payload::Reject => self.state.on_reject(j),
            Payload::Accept => self.state.on_accept(j),
            Payload::Report { weight } => self.state.on_report(weight, j),
            Payload::ChangeCore => self.state.on_change_core(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Link, Links};
    use crate::types::{FragmentId, ProcessId, Weight};

    fn dispatcher(id: u32, neighbors: &[(u32, u64)]) -> Dispatcher {
        let links = Links::new(
            neighbors
                .iter()
                .map(|&(n, w)| Link::new(ProcessId(n), Weight(w)))
                .collect(),
        )
        .unwrap();
        Dispatcher::new(ProcessState::new(ProcessId(id), links))
    }

    #[test]
    fn test_unknown_sender_is_dropped() {
        let mut d = dispatcher(1, &[(2, 5)]);
        let step = d.dispatch(Message::new(ProcessId(9), Payload::Accept));

        assert!(step.outgoing.is_empty());
        assert!(matches!(
            step.failures.as_slice(),
            [CoreError::UnknownSender(ProcessId(9))]
        ));
        assert_eq!(d.stats().dropped, 1);
        assert_eq!(d.state().node_state(), NodeState::Sleeping);
    }

    #[test]
    fn test_deferred_connect_released_by_level_increase() {
        let mut d = dispatcher(1, &[(2, 5), (3, 3)]);

        // Woken up by the message: the Connect goes out on the weight-3 link,
        // while the weight-5 link is still basic, so the message is parked.
        let step = d.dispatch(Message::new(
            ProcessId(2),
            Payload::Connect { level: Level::ZERO },
        ));
        assert_eq!(step.outgoing.len(), 1);
        assert_eq!(step.outgoing[0].to, ProcessId(3));
        assert_eq!(d.stats().deferred, 1);
        assert_eq!(d.backlog_len(), 1);

        // Merging with 3 raises the level to 1, which absorbs process 2.
        let step = d.dispatch(Message::new(
            ProcessId(3),
            Payload::Initiate {
                level: Level(1),
                fragment: FragmentId(3),
                state: NodeState::Find,
            },
        ));
        assert_eq!(d.backlog_len(), 0);
        assert_eq!(d.stats().retried, 1);
        assert_eq!(d.state().pending_responses(), 1);
        assert!(step.outgoing.iter().any(|o| o.to == ProcessId(2)
            && o.message.payload
                == Payload::Initiate {
                    level: Level(1),
                    fragment: FragmentId(3),
                    state: NodeState::Find
                }));
    }

    #[test]
    fn test_deferred_test_waits_for_level() {
        let mut d = dispatcher(1, &[(2, 5), (3, 3)]);
        d.wakeup().unwrap();

        let test = Message::new(
            ProcessId(2),
            Payload::Test {
                level: Level(1),
                fragment: FragmentId(9),
            },
        );
        let step = d.dispatch(test);
        assert!(step.outgoing.is_empty());
        assert_eq!(d.backlog_len(), 1);

        // Merging with 3 raises the level to 1 and releases the Test.
        let initiate = Message::new(
            ProcessId(3),
            Payload::Initiate {
                level: Level(1),
                fragment: FragmentId(3),
                state: NodeState::Find,
            },
        );
        let step = d.dispatch(initiate);
        assert_eq!(d.backlog_len(), 0);
        assert!(step
            .outgoing
            .iter()
            .any(|o| o.to == ProcessId(2) && o.message.payload == Payload::Accept));
        assert_eq!(d.stats().max_defer_cycles, 1);
    }

    #[test]
    fn test_messages_after_termination_are_ignored() {
        let mut d = dispatcher(1, &[(2, 4)]);
        d.wakeup().unwrap();
        d.dispatch(Message::new(
            ProcessId(2),
            Payload::Initiate {
                level: Level(1),
                fragment: FragmentId(4),
                state: NodeState::Find,
            },
        ));
        let step = d.dispatch(Message::new(
            ProcessId(2),
            Payload::Report {
                weight: Weight::INFINITY,
            },
        ));
        assert!(step.halted);
        assert!(d.is_halted());

        let step = d.dispatch(Message::new(
            ProcessId(2),
            Payload::Test {
                level: Level(1),
                fragment: FragmentId(4),
            },
        ));
        assert!(step.outgoing.is_empty());
        assert!(step.failures.is_empty());
    }

    #[test]
    fn test_eligibility_conditions() {
        let mut d = dispatcher(1, &[(2, 5), (3, 3)]);
        let j = d.state().links().find_by_neighbor(ProcessId(2)).unwrap();
        let absorbable = Eligibility::Absorbable {
            level: Level::ZERO,
            link: j,
        };
        assert!(!absorbable.is_met(d.state()));
        assert!(Eligibility::LevelAtLeast(Level::ZERO).is_met(d.state()));
        assert!(!Eligibility::LevelAtLeast(Level(1)).is_met(d.state()));
        assert!(Eligibility::SearchFinished.is_met(d.state()));

        d.dispatch(Message::new(
            ProcessId(3),
            Payload::Initiate {
                level: Level(1),
                fragment: FragmentId(3),
                state: NodeState::Find,
            },
        ));
        assert!(absorbable.is_met(d.state()));
        assert!(!Eligibility::SearchFinished.is_met(d.state()));
    }
}
