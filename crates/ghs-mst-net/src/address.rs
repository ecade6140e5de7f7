//! Deterministic address derivation.
//!
//! Every process listens on one agreed port, and its address follows from
//! its identity alone, so a process can reach any neighbour knowing only the
//! neighbour's id.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use ghs_mst_core::ProcessId;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 7575;

/// Default subnet prefix; the process id becomes the last octet.
pub const DEFAULT_SUBNET: [u8; 3] = [172, 17, 0];

/// How process ids map to socket addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `a.b.c.<id>:<port>`; one host per process, ids must fit in an octet.
    Subnet { prefix: [u8; 3], port: u16 },
    /// `127.0.0.1:<base_port + id>`; every process on one host.
    Loopback { base_port: u16 },
}

impl Default for Addressing {
    fn default() -> Self {
        Addressing::Subnet {
            prefix: DEFAULT_SUBNET,
            port: DEFAULT_PORT,
        }
    }
}

impl Addressing {
    /// Address where `id` listens, or `None` if `id` can't be represented.
    pub fn address_of(&self, id: ProcessId) -> Option<SocketAddr> {
        match *self {
            Addressing::Subnet { prefix, port } => {
                let octet = u8::try_from(id.0).ok()?;
                let ip = Ipv4Addr::new(prefix[0], prefix[1], prefix[2], octet);
                Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            Addressing::Loopback { base_port } => {
                let offset = u16::try_from(id.0).ok()?;
                let port = base_port.checked_add(offset)?;
                Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
            }
        }
    }

    /// Address this process should bind its listener to.
    pub fn bind_address(&self, id: ProcessId) -> Option<SocketAddr> {
        match *self {
            Addressing::Subnet { port, .. } => Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                port,
            ))),
            Addressing::Loopback { .. } => self.address_of(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_address() {
        let addr = Addressing::default().address_of(ProcessId(5)).unwrap();
        assert_eq!(addr.to_string(), "172.17.0.5:7575");
        assert!(Addressing::default().address_of(ProcessId(300)).is_none());
    }

    #[test]
    fn test_loopback_address() {
        let addressing = Addressing::Loopback { base_port: 40000 };
        let addr = addressing.address_of(ProcessId(3)).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:40003");
        assert_eq!(addressing.bind_address(ProcessId(3)), Some(addr));
        assert!(addressing.address_of(ProcessId(30000)).is_none());
    }

    #[test]
    fn test_subnet_binds_all_interfaces() {
        let addr = Addressing::default().bind_address(ProcessId(5)).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:7575");
    }
}
