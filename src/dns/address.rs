//! Resolved address types.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

/// Address family of a resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// A single resolved destination.
///
/// Immutable once produced. Wraps the socket address exactly as the backend
/// returned it, including IPv6 flow info and scope id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    addr: SocketAddr,
}

/// An ordered list of resolved addresses, owned by whoever holds the result.
pub type Addresses = Vec<ResolvedAddress>;

impl ResolvedAddress {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn family(&self) -> AddressFamily {
        match self.addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Length of the equivalent native `sockaddr` structure.
    pub fn len(&self) -> usize {
        match self.addr {
            SocketAddr::V4(_) => 16,
            SocketAddr::V6(_) => 28,
        }
    }

    /// The destination as an IPv6 address, IPv4 being v4-mapped.
    pub fn to_ipv6_mapped(&self) -> Ipv6Addr {
        match self.addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        }
    }
}

impl From<SocketAddr> for ResolvedAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl From<ResolvedAddress> for SocketAddr {
    fn from(addr: ResolvedAddress) -> Self {
        addr.addr
    }
}

impl fmt::Debug for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.addr, f)
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}
