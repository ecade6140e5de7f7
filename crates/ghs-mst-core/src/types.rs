//! Strong type definitions for the protocol.
//!
//! All identifiers are newtypes to prevent mixing up weights, levels and
//! process identities at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Identity of a process (a vertex of the graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Derive the identity from the last octet of an IPv4 address.
    pub fn from_ipv4(addr: Ipv4Addr) -> Self {
        Self(u32::from(addr.octets()[3]))
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// An edge weight.
///
/// Weights are globally unique across the graph, which makes the minimum
/// spanning tree unique and lets weights double as fragment identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(pub u64);

impl Weight {
    /// Sentinel meaning "no outgoing edge found".
    pub const INFINITY: Self = Self(u64::MAX);

    /// Check for the sentinel.
    pub const fn is_infinite(&self) -> bool {
        self.0 == u64::MAX
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for Weight {
    fn from(w: u64) -> Self {
        Self(w)
    }
}

/// Fragment level. Never decreases over a process's lifetime.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Level(pub u32);

impl Level {
    /// The level of a freshly woken single-process fragment.
    pub const ZERO: Self = Self(0);

    /// The level after two equal-level fragments merge.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fragment identifier: the weight of the fragment's core edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentId(pub u64);

impl From<Weight> for FragmentId {
    fn from(w: Weight) -> Self {
        Self(w.0)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Stable index of a link inside a process's [`Links`](crate::Links) arena.
///
/// Only the arena hands these out:
///
/// ```compile_fail
/// let forged = ghs_mst_core::LinkId(7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub(crate) usize);
