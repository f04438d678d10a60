//! Scheme Registry Tests
//!
//! Custom host:port syntaxes registered on a context and used for both
//! directions of the codec.

use resolvnet::base::neterror::NetError;
use resolvnet::dns::hostport;
use resolvnet::dns::{
    Addresses, CustomRequest, CustomResolverVtable, HostPortParser, ResolvedAddress,
    SchemeRegistry,
};
use resolvnet::resolver::{ResolverContext, ResolverContextConfig};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `host@port` syntax.
struct AtSignParser {
    teardowns: Arc<AtomicUsize>,
}

impl HostPortParser for AtSignParser {
    fn scheme(&self) -> &str {
        "at"
    }

    fn join_host_port(&self, host: &str, port: u16) -> Result<String, NetError> {
        Ok(format!("{}@{}", host, port))
    }

    fn split_host_port(&self, joined: &str) -> Result<(String, Option<String>), NetError> {
        match joined.split_once('@') {
            Some((host, port)) if !host.is_empty() => Ok((host.to_string(), Some(port.to_string()))),
            Some(_) => Err(NetError::InvalidHostPort {
                input: joined.to_string(),
            }),
            None => Ok((joined.to_string(), None)),
        }
    }

    fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct LoopbackVtable;

impl CustomResolverVtable for LoopbackVtable {
    fn resolve(&self, host: &str, port: &str) -> Result<Addresses, NetError> {
        if host != "loopback" {
            return Err(NetError::lookup_failed(host, "unknown host"));
        }
        let port = hostport::parse_port(port)?;
        Ok(vec![ResolvedAddress::new(SocketAddr::new(
            "127.0.0.1".parse().unwrap(),
            port,
        ))])
    }

    fn resolve_async(&self, request: CustomRequest, host: &str, port: &str) {
        let result = self.resolve(host, port);
        request.complete(result);
    }
}

#[test]
fn test_custom_syntax_round_trip_through_context() {
    let teardowns = Arc::new(AtomicUsize::new(0));
    let ctx = ResolverContext::init_with_backend(
        ResolverContextConfig::default().scheme_capacity(2),
        Arc::new(LoopbackVtable),
    )
    .unwrap();
    ctx.register_scheme(AtSignParser {
        teardowns: Arc::clone(&teardowns),
    });

    assert_eq!(ctx.join_host_port("at", "loopback", 7000).unwrap(), "loopback@7000");
    assert_eq!(
        ctx.split_target("at://loopback@7000").unwrap(),
        ("loopback".to_string(), Some("7000".to_string()))
    );

    let addrs = ctx.resolve_blocking("at://loopback@7000", None).unwrap();
    assert_eq!(addrs[0].port(), 7000);

    let err = ctx.resolve_blocking("at://@7000", None).unwrap_err();
    assert!(matches!(err, NetError::InvalidHostPort { .. }));

    ctx.shutdown();
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_codec_without_scheme() {
    let ctx = ResolverContext::init_with_backend(
        ResolverContextConfig::default(),
        Arc::new(LoopbackVtable),
    )
    .unwrap();

    assert_eq!(
        ctx.split_target("[::1]:443").unwrap(),
        ("::1".to_string(), Some("443".to_string()))
    );
    let addrs = ctx.resolve_blocking("loopback", Some("8080")).unwrap();
    assert_eq!(addrs[0].port(), 8080);
}

#[test]
fn test_lookup_miss_is_none() {
    let registry = SchemeRegistry::new(1);
    assert!(registry.lookup("at").is_none());
    assert_eq!(registry.capacity(), 1);
}

#[test]
fn test_handle_outlives_registry_shutdown() {
    let teardowns = Arc::new(AtomicUsize::new(0));
    let registry = SchemeRegistry::new(1);
    registry.register(AtSignParser {
        teardowns: Arc::clone(&teardowns),
    });

    let handle = registry.lookup("at").unwrap();
    registry.shutdown();
    assert_eq!(handle.join_host_port("h", 1).unwrap(), "h@1");
    assert_eq!(teardowns.load(Ordering::SeqCst), 0);

    drop(handle);
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}
