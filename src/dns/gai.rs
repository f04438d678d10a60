//! System resolver using getaddrinfo.
//!
//! Lookups run on the blocking pool of a private tokio runtime, so a slow
//! name server never stalls the caller. The pool size bounds how many
//! lookups are in flight at once; the rest queue.

use super::{Addresses, Name, Resolve, ResolvedAddress};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::hostport;
use crate::dns::request::{Completion, OnDone, RequestHandle};
use crate::dns::sort::AddressSorter;
use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};
use tokio::runtime::{Builder, Handle, Runtime};

/// Default number of concurrent getaddrinfo calls.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// System resolver running `getaddrinfo` on a bounded thread pool.
///
/// Callbacks of [`resolve_name`](Resolve::resolve_name) run on a pool
/// thread. With a timeout configured, a lookup that overruns it completes
/// with [`NetError::ResolutionTimedOut`]; the lookup itself keeps its pool
/// thread until the system call returns.
pub struct GaiResolver {
    runtime: Option<Runtime>,
    handle: Handle,
    sorter: Arc<AddressSorter>,
    timeout: Option<Duration>,
}

impl GaiResolver {
    /// Creates a resolver with [`DEFAULT_WORKER_THREADS`] pool threads and
    /// no timeout.
    pub fn new(sorter: AddressSorter) -> io::Result<Self> {
        Self::with_pool(sorter, DEFAULT_WORKER_THREADS, None)
    }

    /// Creates a resolver with at most `worker_threads` concurrent lookups.
    pub fn with_pool(
        sorter: AddressSorter,
        worker_threads: usize,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(worker_threads.max(1))
            .thread_name("resolvnet-gai")
            .enable_time()
            .build()?;
        tracing::debug!(worker_threads, ?timeout, "started getaddrinfo pool");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            sorter: Arc::new(sorter),
            timeout,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Resolve for GaiResolver {
    fn resolve_name(&self, name: Name, on_done: OnDone) -> RequestHandle {
        let completion = Completion::new(name.as_str(), on_done);
        let handle = RequestHandle::new(Arc::clone(&completion));
        let sorter = Arc::clone(&self.sorter);

        match self.timeout {
            None => {
                self.handle.spawn_blocking(move || {
                    if completion.is_pending() {
                        completion.complete(lookup(&sorter, &name));
                    }
                });
            }
            Some(timeout) => {
                let domain = name.as_str().to_string();
                let task = self.handle.spawn_blocking(move || lookup(&sorter, &name));
                self.handle.spawn(async move {
                    let result = match tokio::time::timeout(timeout, task).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "getaddrinfo task failed");
                            Err(NetError::lookup_failed(domain, e.to_string()))
                        }
                        Err(_) => {
                            tracing::debug!(domain = %domain, ?timeout, "resolution timed out");
                            Err(NetError::ResolutionTimedOut { domain })
                        }
                    };
                    completion.complete(result);
                });
            }
        }
        handle
    }

    fn resolve_name_blocking(&self, name: &Name) -> Result<Addresses, NetError> {
        lookup(&self.sorter, name)
    }
}

impl Drop for GaiResolver {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for GaiResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaiResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn lookup(sorter: &AddressSorter, name: &Name) -> Result<Addresses, NetError> {
    let (host, port) = hostport::split_with_default(name.as_str(), name.default_port())?;
    let port = numeric_port(&port)?;

    let mut addrs = match SocketAddrs::try_parse(&host, port) {
        Some(literal) => literal.into_addresses(),
        None => getaddrinfo(&host, port)?,
    };
    if addrs.is_empty() {
        return Err(NetError::EmptyResult { domain: host });
    }
    sorter.sort(&mut addrs);
    Ok(addrs)
}

/// The system call wants a numeric port; service names the resolver knows
/// are mapped, anything else is an invalid argument.
fn numeric_port(port: &str) -> Result<u16, NetError> {
    hostport::parse_port(port).or_else(|e| match hostport::named_port_to_numeric(port) {
        Some(numeric) => {
            tracing::debug!(port, numeric, "using numeric port for service name");
            hostport::parse_port(numeric)
        }
        None => Err(e),
    })
}

fn getaddrinfo(host: &str, port: u16) -> Result<Addresses, NetError> {
    tracing::debug!(host = %host, port, "resolving via getaddrinfo");
    let addrs: Addresses = (host, port)
        .to_socket_addrs()
        .dns_context(host)
        .map_err(|e| {
            tracing::debug!(host = %host, error = %e, "getaddrinfo failed");
            e
        })?
        .map(ResolvedAddress::from)
        .collect();
    tracing::debug!(host = %host, count = addrs.len(), "getaddrinfo complete");
    Ok(addrs)
}

/// Utility for parsing IP address strings directly.
///
/// Bypasses the system call if the host is already an IP literal.
pub struct SocketAddrs {
    addrs: Vec<SocketAddr>,
}

impl SocketAddrs {
    /// Attempts to parse a host string as an IP address.
    ///
    /// Returns `Some` if the host is a valid IPv4 or IPv6 address,
    /// `None` if it's a hostname that requires resolution.
    pub fn try_parse(host: &str, port: u16) -> Option<Self> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Some(Self {
                addrs: vec![SocketAddr::V4(SocketAddrV4::new(addr, port))],
            });
        }

        if let Ok(addr) = host.parse::<Ipv6Addr>() {
            return Some(Self {
                addrs: vec![SocketAddr::V6(SocketAddrV6::new(addr, port, 0, 0))],
            });
        }

        None
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn into_addresses(self) -> Addresses {
        self.addrs.into_iter().map(ResolvedAddress::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::request::RequestState;
    use crate::dns::sourceaddr::{SourceAddr, SourceAddrProbe};
    use std::net::IpAddr;
    use std::sync::mpsc;

    /// Every destination is reachable from a same-family loopback source.
    struct LoopbackProbe;

    impl SourceAddrProbe for LoopbackProbe {
        fn source_addr(&self, dest: &ResolvedAddress) -> Option<SourceAddr> {
            let ip = match dest.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            Some(SourceAddr::new(SocketAddr::new(ip, 0)))
        }
    }

    fn resolver() -> GaiResolver {
        GaiResolver::with_pool(AddressSorter::new(Arc::new(LoopbackProbe)), 2, None).unwrap()
    }

    #[test]
    fn test_socket_addrs_try_parse_ipv4() {
        let addrs = SocketAddrs::try_parse("127.0.0.1", 8080).unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(
            addrs.addrs[0],
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080)
        );
    }

    #[test]
    fn test_socket_addrs_try_parse_ipv6() {
        let addrs = SocketAddrs::try_parse("::1", 443).unwrap();
        assert_eq!(addrs.len(), 1);
        assert!(addrs.addrs[0].is_ipv6());
    }

    #[test]
    fn test_socket_addrs_try_parse_hostname() {
        assert!(SocketAddrs::try_parse("example.com", 80).is_none());
    }

    #[test]
    fn test_numeric_port() {
        assert_eq!(numeric_port("8080").unwrap(), 8080);
        assert_eq!(numeric_port("https").unwrap(), 443);
        assert_eq!(numeric_port("http").unwrap(), 80);
        assert!(matches!(
            numeric_port("gopher"),
            Err(NetError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_blocking_literal_skips_lookup() {
        let addrs = resolver()
            .resolve_name_blocking(&Name::new("[::1]:50051"))
            .unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].port(), 50051);
        assert_eq!(addrs[0].ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_blocking_default_port() {
        let addrs = resolver()
            .resolve_name_blocking(&Name::new("127.0.0.1").with_default_port("https"))
            .unwrap();
        assert_eq!(addrs[0].port(), 443);
    }

    #[test]
    fn test_blocking_missing_port() {
        let err = resolver()
            .resolve_name_blocking(&Name::new("localhost"))
            .unwrap_err();
        assert!(matches!(err, NetError::MissingPort { .. }));
    }

    #[test]
    fn test_blocking_localhost() {
        let addrs = resolver()
            .resolve_name_blocking(&Name::new("localhost:80"))
            .unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a.port() == 80));
    }

    #[test]
    fn test_async_callback_runs_on_pool_thread() {
        let resolver = resolver();
        let (tx, rx) = mpsc::channel();
        let caller = std::thread::current().id();

        let _handle = resolver.resolve_name(
            Name::new("127.0.0.1:443"),
            Box::new(move |result| {
                tx.send((std::thread::current().id(), result)).unwrap();
            }),
        );

        let (thread, result) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_ne!(thread, caller);
        assert_eq!(result.unwrap()[0].port(), 443);
    }

    #[test]
    fn test_async_malformed_input_fails_through_callback() {
        let resolver = resolver();
        let (tx, rx) = mpsc::channel();

        let _handle = resolver.resolve_name(
            Name::new("[::1"),
            Box::new(move |result| tx.send(result).unwrap()),
        );

        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(result, Err(NetError::InvalidHostPort { .. })));
    }

    #[test]
    fn test_timeout_completes_once_when_pool_is_busy() {
        let resolver = GaiResolver::with_pool(
            AddressSorter::new(Arc::new(LoopbackProbe)),
            1,
            Some(Duration::from_millis(50)),
        )
        .unwrap();

        // Occupy the only pool thread so the lookup queues past its deadline.
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let _blocker = resolver.handle.spawn_blocking(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = resolver.resolve_name(
            Name::new("127.0.0.1:80"),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        match result {
            Err(NetError::ResolutionTimedOut { domain }) => assert_eq!(domain, "127.0.0.1:80"),
            other => panic!("expected a timeout, got {:?}", other),
        }
        assert_eq!(handle.state(), RequestState::Completed);
        assert!(!handle.orphan());

        // The queued lookup now runs and finishes; its result goes nowhere.
        release_tx.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[tokio::test]
    async fn test_resolve_future_localhost() {
        let resolver = resolver();
        let addrs = resolver
            .resolve(Name::new("localhost").with_default_port("http"))
            .await
            .unwrap();
        assert!(!addrs.is_empty());
        assert_eq!(addrs[0].port(), 80);
    }
}
