//! Scheme-keyed registry of host:port parsers.
//!
//! The table is small and closed: handlers are registered while the process
//! configures itself and looked up afterwards. Registering a duplicate scheme
//! or overflowing the table is a deployment bug and panics.

use crate::base::neterror::NetError;
use crate::dns::hostport;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Parser for the host:port syntax of one scheme.
pub trait HostPortParser: Send + Sync {
    /// Registry key. Must be stable for the lifetime of the parser.
    fn scheme(&self) -> &str;

    fn join_host_port(&self, host: &str, port: u16) -> Result<String, NetError>;

    fn split_host_port(&self, joined: &str) -> Result<(String, Option<String>), NetError>;

    /// Runs once, when the last [`SchemeHandle`] is released.
    fn teardown(&self) {}
}

/// Parser for the plain `host:port` / `[v6]:port` syntax.
#[derive(Debug, Clone)]
pub struct DefaultHostPortParser {
    scheme: String,
}

impl DefaultHostPortParser {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
        }
    }
}

impl HostPortParser for DefaultHostPortParser {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn join_host_port(&self, host: &str, port: u16) -> Result<String, NetError> {
        Ok(hostport::join_host_port(host, port))
    }

    fn split_host_port(&self, joined: &str) -> Result<(String, Option<String>), NetError> {
        hostport::split_host_port(joined)
    }
}

struct HandlerInner {
    parser: Box<dyn HostPortParser>,
}

impl Drop for HandlerInner {
    fn drop(&mut self) {
        tracing::debug!(scheme = %self.parser.scheme(), "tearing down scheme handler");
        self.parser.teardown();
    }
}

/// Counted reference to a registered parser.
///
/// Cloning takes a reference, dropping releases it. The parser's
/// [`teardown`](HostPortParser::teardown) runs when the count reaches zero.
pub struct SchemeHandle {
    inner: Arc<HandlerInner>,
}

impl SchemeHandle {
    pub fn new(parser: impl HostPortParser + 'static) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                parser: Box::new(parser),
            }),
        }
    }

    /// Number of live handles, the registry's own included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Clone for SchemeHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Deref for SchemeHandle {
    type Target = dyn HostPortParser;

    fn deref(&self) -> &Self::Target {
        self.inner.parser.as_ref()
    }
}

impl fmt::Debug for SchemeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeHandle")
            .field("scheme", &self.scheme())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Why a registration was refused.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RegistrationError {
    #[error("scheme '{0}' is already registered")]
    Duplicate(String),
    #[error("scheme table is full ({capacity} entries), cannot register '{scheme}'")]
    CapacityExceeded { scheme: String, capacity: usize },
    #[error("scheme registry is shut down, cannot register '{0}'")]
    ShutDown(String),
}

/// Bounded scheme-to-parser table.
pub struct SchemeRegistry {
    handlers: DashMap<String, SchemeHandle>,
    capacity: usize,
    shut_down: AtomicBool,
}

impl SchemeRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            handlers: DashMap::with_capacity(capacity),
            capacity,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Registers a parser, panicking if the scheme is taken, the table is
    /// full or the registry was shut down.
    pub fn register(&self, parser: impl HostPortParser + 'static) {
        if let Err(e) = self.try_register(parser) {
            tracing::error!(error = %e, "scheme registration failed");
            panic!("{}", e);
        }
    }

    /// Registers a parser, reporting the reason for a refusal instead of
    /// panicking.
    pub fn try_register(
        &self,
        parser: impl HostPortParser + 'static,
    ) -> Result<(), RegistrationError> {
        let scheme = parser.scheme().to_string();
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RegistrationError::ShutDown(scheme));
        }
        if self.handlers.len() >= self.capacity && !self.handlers.contains_key(&scheme) {
            return Err(RegistrationError::CapacityExceeded {
                scheme,
                capacity: self.capacity,
            });
        }
        match self.handlers.entry(scheme) {
            Entry::Occupied(entry) => Err(RegistrationError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(scheme = %entry.key(), "registered scheme handler");
                entry.insert(SchemeHandle::new(parser));
                Ok(())
            }
        }
    }

    /// Returns a new reference to the parser for `scheme`.
    pub fn lookup(&self, scheme: &str) -> Option<SchemeHandle> {
        self.handlers.get(scheme).map(|handle| handle.value().clone())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Releases the registry's reference to every handler and refuses all
    /// later registrations. Handlers still referenced by callers are torn
    /// down when those references go away.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(count = self.handlers.len(), "shutting down scheme registry");
        self.handlers.clear();
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("len", &self.handlers.len())
            .field("capacity", &self.capacity)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
