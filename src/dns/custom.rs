//! Resolver backend supplied by the embedder.
//!
//! The embedder implements [`CustomResolverVtable`]. Blocking lookups call
//! straight into it; asynchronous lookups hand it a [`CustomRequest`] that
//! it completes whenever and from whichever thread it likes. The backend
//! itself runs no threads.

use super::{Addresses, Name, Resolve};
use crate::base::neterror::NetError;
use crate::dns::hostport;
use crate::dns::request::{Completion, OnDone, RequestHandle};
use crate::dns::sort::AddressSorter;
use std::fmt;
use std::sync::Arc;

/// Lookup entry points provided by the embedder.
///
/// Hosts arrive split from their port; ports are passed through as given,
/// so they may be numeric or service names.
pub trait CustomResolverVtable: Send + Sync {
    /// Resolves on the calling thread.
    fn resolve(&self, host: &str, port: &str) -> Result<Addresses, NetError>;

    /// Starts a lookup. The implementation must eventually call
    /// [`CustomRequest::complete`]; dropping the request without doing so
    /// fails it with [`NetError::BackendUnavailable`].
    fn resolve_async(&self, request: CustomRequest, host: &str, port: &str);
}

struct Backend {
    vtable: Arc<dyn CustomResolverVtable>,
    sorter: AddressSorter,
}

impl Backend {
    /// Empty results fail; anything else is sorted.
    fn finish(&self, host: &str, result: Result<Addresses, NetError>) -> Result<Addresses, NetError> {
        let mut addrs = result?;
        if addrs.is_empty() {
            return Err(NetError::EmptyResult {
                domain: host.to_string(),
            });
        }
        self.sorter.sort(&mut addrs);
        Ok(addrs)
    }
}

/// An outstanding lookup handed to the embedder.
pub struct CustomRequest {
    completion: Option<Arc<Completion>>,
    backend: Arc<Backend>,
    host: String,
    port: String,
    retried_numeric: bool,
}

impl CustomRequest {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Whether the caller has lost interest. Work for an orphaned request
    /// can be skipped; completing it is still allowed and does nothing.
    pub fn is_orphaned(&self) -> bool {
        self.completion.as_ref().map_or(true, |c| !c.is_pending())
    }

    /// Reports the outcome. Consumes the request, so it can run only once.
    ///
    /// A failure for a service-name port the resolver knows (`http`,
    /// `https`) is retried once with the numeric port before it is
    /// reported.
    pub fn complete(mut self, result: Result<Addresses, NetError>) {
        let Some(completion) = self.completion.take() else {
            return;
        };

        if let Err(e) = &result {
            if let Some(numeric) = self.numeric_retry() {
                if completion.is_pending() {
                    tracing::debug!(
                        host = %self.host,
                        port = %self.port,
                        numeric,
                        error = %e,
                        "retrying custom lookup with numeric port"
                    );
                    let retry = CustomRequest {
                        completion: Some(completion),
                        backend: Arc::clone(&self.backend),
                        host: self.host.clone(),
                        port: numeric.to_string(),
                        retried_numeric: true,
                    };
                    self.backend
                        .vtable
                        .resolve_async(retry, &self.host, numeric);
                }
                return;
            }
        }

        completion.complete(self.backend.finish(&self.host, result));
    }

    fn numeric_retry(&self) -> Option<&'static str> {
        if self.retried_numeric {
            return None;
        }
        hostport::named_port_to_numeric(&self.port)
    }
}

impl Drop for CustomRequest {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            tracing::warn!(host = %self.host, "custom resolver dropped a request without completing it");
            completion.complete(Err(NetError::BackendUnavailable));
        }
    }
}

impl fmt::Debug for CustomRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("orphaned", &self.is_orphaned())
            .finish()
    }
}

/// Backend delegating lookups to an embedder-supplied [`CustomResolverVtable`].
#[derive(Clone)]
pub struct CustomResolver {
    backend: Arc<Backend>,
}

impl CustomResolver {
    pub fn new(vtable: Arc<dyn CustomResolverVtable>, sorter: AddressSorter) -> Self {
        Self {
            backend: Arc::new(Backend { vtable, sorter }),
        }
    }
}

impl Resolve for CustomResolver {
    /// Malformed input completes before this returns, on the calling
    /// thread. Otherwise the callback runs wherever the embedder completes
    /// the request.
    fn resolve_name(&self, name: Name, on_done: OnDone) -> RequestHandle {
        let completion = Completion::new(name.as_str(), on_done);
        let handle = RequestHandle::new(Arc::clone(&completion));

        let (host, port) = match hostport::split_with_default(name.as_str(), name.default_port()) {
            Ok(split) => split,
            Err(e) => {
                completion.complete(Err(e));
                return handle;
            }
        };
        tracing::debug!(host = %host, port = %port, "starting custom lookup");

        let request = CustomRequest {
            completion: Some(completion),
            backend: Arc::clone(&self.backend),
            host: host.clone(),
            port: port.clone(),
            retried_numeric: false,
        };
        self.backend.vtable.resolve_async(request, &host, &port);
        handle
    }

    fn resolve_name_blocking(&self, name: &Name) -> Result<Addresses, NetError> {
        let (host, port) = hostport::split_with_default(name.as_str(), name.default_port())?;
        let vtable = &self.backend.vtable;
        let result = match vtable.resolve(&host, &port) {
            Err(e) => match hostport::named_port_to_numeric(&port) {
                Some(numeric) => {
                    tracing::debug!(host = %host, port = %port, error = %e, "retrying custom lookup with numeric port");
                    vtable.resolve(&host, numeric)
                }
                None => Err(e),
            },
            ok => ok,
        };
        self.backend.finish(&host, result)
    }
}

impl fmt::Debug for CustomResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomResolver").finish_non_exhaustive()
    }
}
