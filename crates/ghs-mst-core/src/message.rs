//! Protocol message types.
//!
//! Seven message kinds travel between neighbouring processes. The kind is a
//! closed enum so every handler site matches exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{FragmentId, Level, ProcessId, Weight};

/// Search state of a process (and of the fragment it reports for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Not yet woken up.
    Sleeping,
    /// Fragment is searching for its minimum outgoing edge.
    Find,
    /// Search finished on this process; waiting for the next epoch.
    Found,
}

impl NodeState {
    /// Name used on the wire and in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeState::Sleeping => "Sleeping",
            NodeState::Find => "Find",
            NodeState::Found => "Found",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Connect,
    Initiate,
    Test,
    Reject,
    Accept,
    Report,
    ChangeCore,
}

impl MessageKind {
    /// Every kind, in protocol order.
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Connect,
        MessageKind::Initiate,
        MessageKind::Test,
        MessageKind::Reject,
        MessageKind::Accept,
        MessageKind::Report,
        MessageKind::ChangeCore,
    ];

    /// Name used on the wire and in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Connect => "Connect",
            MessageKind::Initiate => "Initiate",
            MessageKind::Test => "Test",
            MessageKind::Reject => "Reject",
            MessageKind::Accept => "Accept",
            MessageKind::Report => "Report",
            MessageKind::ChangeCore => "ChangeCore",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific message contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Propose merging along this edge.
    Connect { level: Level },
    /// Start (or announce) a fragment epoch.
    Initiate {
        level: Level,
        fragment: FragmentId,
        state: NodeState,
    },
    /// Ask whether this edge leaves the sender's fragment.
    Test { level: Level, fragment: FragmentId },
    /// The tested edge is internal.
    Reject,
    /// The tested edge is outgoing.
    Accept,
    /// Best outgoing weight found in the sender's subtree.
    Report { weight: Weight },
    /// Move the fragment core toward the minimum outgoing edge.
    ChangeCore,
}

impl Payload {
    /// The kind of this payload.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Payload::Connect { .. } => MessageKind::Connect,
            Payload::Initiate { .. } => MessageKind::Initiate,
            Payload::Test { .. } => MessageKind::Test,
            Payload::Reject => MessageKind::Reject,
            Payload::Accept => MessageKind::Accept,
            Payload::Report { .. } => MessageKind::Report,
            Payload::ChangeCore => MessageKind::ChangeCore,
        }
    }
}

/// A protocol message tagged with the identity of its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending process.
    pub source: ProcessId,
    /// Kind and arguments.
    pub payload: Payload,
}

impl Message {
    pub const fn new(source: ProcessId, payload: Payload) -> Self {
        Self { source, payload }
    }

    pub const fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::Connect { level } => write!(f, "Connect(L={}) from {}", level, self.source),
            Payload::Initiate {
                level,
                fragment,
                state,
            } => write!(
                f,
                "Initiate(L={}, {}, {}) from {}",
                level, fragment, state, self.source
            ),
            Payload::Test { level, fragment } => {
                write!(f, "Test(L={}, {}) from {}", level, fragment, self.source)
            }
            Payload::Report { weight } => write!(f, "Report(W={}) from {}", weight, self.source),
            Payload::Reject | Payload::Accept | Payload::ChangeCore => {
                write!(f, "{} from {}", self.kind(), self.source)
            }
        }
    }
}

/// A message addressed to a neighbour, waiting to be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outgoing {
    /// Destination process.
    pub to: ProcessId,
    /// The message itself.
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind() {
        let payload = Payload::Initiate {
            level: Level(1),
            fragment: FragmentId(3),
            state: NodeState::Find,
        };
        assert_eq!(payload.kind(), MessageKind::Initiate);
        assert_eq!(Payload::ChangeCore.kind(), MessageKind::ChangeCore);
    }

    #[test]
    fn test_message_display() {
        let msg = Message::new(ProcessId(4), Payload::Report { weight: Weight::INFINITY });
        assert_eq!(msg.to_string(), "Report(W=inf) from 4");

        let msg = Message::new(ProcessId(2), Payload::Accept);
        assert_eq!(msg.to_string(), "Accept from 2");
    }

    #[test]
    fn test_kind_names_are_distinct() {
        let mut names: Vec<_> = MessageKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);
    }
}
