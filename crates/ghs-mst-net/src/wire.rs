//! Wire format.
//!
//! Every message travels as a CBOR map with the fixed keys `type`, `L`, `F`,
//! `S`, `W` and `sourceID`. Fields that a kind does not use are sent as zero
//! and ignored on receipt; `S` is only present on `Initiate`.

use serde::{Deserialize, Serialize};

use ghs_mst_core::{
    FragmentId, Level, Message, MessageKind, NodeState, Payload, ProcessId, Weight,
};

use crate::error::{NetError, Result};

/// Upper bound on an encoded message. Real messages are well under 100 bytes.
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Flat, self-describing representation of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "L", default)]
    pub level: u32,
    #[serde(rename = "F", default)]
    pub fragment: u64,
    #[serde(rename = "S", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
    #[serde(rename = "W", default)]
    pub weight: u64,
    #[serde(rename = "sourceID")]
    pub source: u32,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let mut wire = WireMessage {
            kind: message.kind(),
            level: 0,
            fragment: 0,
            state: None,
            weight: 0,
            source: message.source.0,
        };
        match message.payload {
            Payload::Connect { level } => wire.level = level.0,
            Payload::Initiate {
                level,
                fragment,
                state,
            } => {
                wire.level = level.0;
                wire.fragment = fragment.0;
                wire.state = Some(state);
            }
            Payload::Test { level, fragment } => {
                wire.level = level.0;
                wire.fragment = fragment.0;
            }
            Payload::Report { weight } => wire.weight = weight.0,
            Payload::Reject | Payload::Accept | Payload::ChangeCore => {}
        }
        wire
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = NetError;

    fn try_from(wire: WireMessage) -> Result<Self> {
        let level = Level(wire.level);
        let fragment = FragmentId(wire.fragment);
        let payload = match wire.kind {
            MessageKind::Connect => Payload::Connect { level },
            MessageKind::Initiate => match wire.state {
                Some(state @ (NodeState::Find | NodeState::Found)) => Payload::Initiate {
                    level,
                    fragment,
                    state,
                },
                Some(NodeState::Sleeping) => {
                    return Err(NetError::InvalidMessage(
                        "Initiate cannot carry state Sleeping".into(),
                    ))
                }
                None => {
                    return Err(NetError::InvalidMessage("Initiate without state".into()));
                }
            },
            MessageKind::Test => Payload::Test { level, fragment },
            MessageKind::Reject => Payload::Reject,
            MessageKind::Accept => Payload::Accept,
            MessageKind::Report => Payload::Report {
                weight: Weight(wire.weight),
            },
            MessageKind::ChangeCore => Payload::ChangeCore,
        };
        Ok(Message::new(ProcessId(wire.source), payload))
    }
}

/// Encode a message to CBOR bytes.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let wire = WireMessage::from(message);
    let mut buf = Vec::with_capacity(64);
    ciborium::into_writer(&wire, &mut buf).map_err(|e| NetError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode a message from CBOR bytes.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.len() > MAX_MESSAGE_BYTES {
        return Err(NetError::TooLarge(bytes.len()));
    }
    if bytes.is_empty() {
        return Err(NetError::Decoding("empty message".into()));
    }
    let wire: WireMessage =
        ciborium::from_reader(bytes).map_err(|e| NetError::Decoding(e.to_string()))?;
    Message::try_from(wire)
}
