//! Source address discovery for destination sorting.
//!
//! The kernel picks a source address when a datagram socket is connected.
//! Connecting a UDP socket sends nothing, so it doubles as a route and
//! source-selection probe. One socket per family is cached and serialized by
//! its own lock, since sorts run concurrently from independent completions.

use crate::dns::address::{AddressFamily, ResolvedAddress};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

/// The source address the host would use to reach a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAddr {
    pub addr: SocketAddr,
    /// Address is past its preferred lifetime.
    pub deprecated: bool,
    /// Temporary (privacy) or care-of address rather than a home address.
    pub temporary: bool,
}

impl SourceAddr {
    /// A source address with no platform-surfaced flags.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            deprecated: false,
            temporary: false,
        }
    }
}

/// Finds the source address for a destination, if there is a route to it.
pub trait SourceAddrProbe: Send + Sync {
    fn source_addr(&self, dest: &ResolvedAddress) -> Option<SourceAddr>;
}

struct CacheEntry {
    family: AddressFamily,
    socket: Mutex<Option<Socket>>,
}

impl CacheEntry {
    fn open(family: AddressFamily) -> Self {
        let socket = match Self::new_socket(family) {
            Ok(socket) => Some(socket),
            Err(e) => {
                tracing::debug!(?family, error = %e, "source address probe socket unavailable");
                None
            }
        };
        Self {
            family,
            socket: Mutex::new(socket),
        }
    }

    fn new_socket(family: AddressFamily) -> io::Result<Socket> {
        let domain = match family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    fn probe(&self, dest: SocketAddr) -> io::Result<Option<SocketAddr>> {
        let mut guard = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(socket) = guard.as_ref() else {
            return Ok(None);
        };
        let found = socket
            .connect(&SockAddr::from(dest))
            .and_then(|()| socket.local_addr());

        // A connected socket keeps the source it was first given, so the
        // association is dissolved before the next destination is probed.
        if let Err(e) = disconnect(socket) {
            tracing::trace!(family = ?self.family, error = %e, "reopening probe socket");
            *guard = Self::new_socket(self.family).ok();
        }
        Ok(found?.as_socket())
    }

    fn close(&self) {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Connects to an `AF_UNSPEC` address, which drops the peer and the
/// auto-bound source of a datagram socket.
fn disconnect(socket: &Socket) -> io::Result<()> {
    // SAFETY: `try_init` hands the closure zeroed storage, and a zeroed
    // sockaddr has family AF_UNSPEC.
    let ((), unspec) = unsafe { SockAddr::try_init(|_, _| Ok(())) }?;
    socket.connect(&unspec)
}

/// Probe backed by one cached, non-blocking UDP socket per address family.
pub struct SocketSourceAddrProbe {
    v4: CacheEntry,
    v6: CacheEntry,
}

impl SocketSourceAddrProbe {
    /// Opens the per-family probe sockets. A family the host does not
    /// support simply never yields a source address.
    pub fn new() -> Self {
        Self {
            v4: CacheEntry::open(AddressFamily::Ipv4),
            v6: CacheEntry::open(AddressFamily::Ipv6),
        }
    }

    /// Closes the cached sockets. Later probes find no source address.
    pub fn shutdown(&self) {
        self.v4.close();
        self.v6.close();
    }

    fn entry(&self, family: AddressFamily) -> &CacheEntry {
        match family {
            AddressFamily::Ipv4 => &self.v4,
            AddressFamily::Ipv6 => &self.v6,
        }
    }
}

impl Default for SocketSourceAddrProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAddrProbe for SocketSourceAddrProbe {
    fn source_addr(&self, dest: &ResolvedAddress) -> Option<SourceAddr> {
        let entry = self.entry(dest.family());
        debug_assert_eq!(entry.family, dest.family());
        match entry.probe(dest.socket_addr()) {
            Ok(found) => found.map(SourceAddr::new),
            Err(e) => {
                tracing::trace!(dest = %dest, error = %e, "no source address for destination");
                None
            }
        }
    }
}

impl fmt::Debug for SocketSourceAddrProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketSourceAddrProbe").finish_non_exhaustive()
    }
}
