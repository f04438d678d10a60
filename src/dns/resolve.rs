//! Core resolution types and the backend trait.
//!
//! A backend turns a target name into addresses two ways: by starting a
//! request that reports through a callback, or by blocking the caller. An
//! async adapter over the callback form is provided for tokio callers.

use crate::base::neterror::NetError;
use crate::dns::address::Addresses;
use crate::dns::request::{OnDone, RequestHandle};
use std::{fmt, future::Future, pin::Pin, sync::Arc};
use tokio::sync::oneshot;

/// A target to resolve, plus the port to use when the target names none.
///
/// The target is `host`, `host:port` or `[literal]:port`; the port may be a
/// number or a service name.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
    default_port: Option<Box<str>>,
}

impl Name {
    /// Creates a new [`Name`] with no default port.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self {
            host: host.into(),
            default_port: None,
        }
    }

    /// Sets the port used when the target names none.
    pub fn with_default_port(mut self, port: impl Into<Box<str>>) -> Self {
        self.default_port = Some(port.into());
        self
    }

    /// View the target as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn default_port(&self) -> Option<&str> {
        self.default_port.as_deref()
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default_port {
            Some(port) => write!(f, "{:?} (default port {:?})", self.host, port),
            None => fmt::Debug::fmt(&self.host, f),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for the `Future` type returned by [`Resolve::resolve`].
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addresses, NetError>> + Send>>;

/// A resolver backend.
///
/// Implementations must be thread-safe: requests are started and completed
/// from arbitrary threads. Results handed to callers are already sorted in
/// destination preference order.
pub trait Resolve: Send + Sync {
    /// Starts a resolution. `on_done` runs exactly once with the outcome,
    /// unless the request is orphaned through the returned handle first.
    fn resolve_name(&self, name: Name, on_done: OnDone) -> RequestHandle;

    /// Resolves on the calling thread.
    fn resolve_name_blocking(&self, name: &Name) -> Result<Addresses, NetError>;

    /// Resolves without blocking a runtime thread.
    ///
    /// Dropping the future orphans the underlying request, so wrapping it
    /// in `tokio::time::timeout` gives cancellation on expiry.
    fn resolve(&self, name: Name) -> Resolving {
        let (tx, rx) = oneshot::channel();
        let handle = self.resolve_name(
            name,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        // Built before the future so that dropping it unpolled still orphans.
        let guard = OrphanOnDrop(handle);
        Box::pin(async move {
            let result = rx.await.map_err(|_| NetError::BackendUnavailable)?;
            drop(guard);
            result
        })
    }
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve_name(&self, name: Name, on_done: OnDone) -> RequestHandle {
        (**self).resolve_name(name, on_done)
    }

    fn resolve_name_blocking(&self, name: &Name) -> Result<Addresses, NetError> {
        (**self).resolve_name_blocking(name)
    }

    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

struct OrphanOnDrop(RequestHandle);

impl Drop for OrphanOnDrop {
    fn drop(&mut self) {
        self.0.orphan();
    }
}
