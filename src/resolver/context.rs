//! Resolver Context - the process-wide resolution facade.
//!
//! Bundles the pieces that live for the whole process: the scheme table,
//! the active backend, the destination sorter with its probe sockets and
//! the callback delivery thread. Built once at startup, shut down once.

use super::config::ResolverContextConfig;
use crate::base::attempt::ResolutionAttempts;
use crate::base::neterror::NetError;
use crate::dns::hostport;
use crate::dns::{
    Addresses, AddressSorter, Completion, CustomResolver, CustomResolverVtable, GaiResolver,
    HostPortParser, Name, OnDone, RequestHandle, Resolve, ResolvedAddress, SchemeHandle,
    SchemeRegistry, SocketSourceAddrProbe, SourceAddrProbe,
};
use crate::event::EventQueue;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread on which a completion callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Whatever thread completes the lookup.
    #[default]
    Inline,
    /// The context's delivery thread, in completion order.
    EventThread,
}

/// Builder for [`ResolverContext`].
pub struct ResolverContextBuilder {
    config: ResolverContextConfig,
    vtable: Option<Arc<dyn CustomResolverVtable>>,
    probe: Option<Arc<dyn SourceAddrProbe>>,
}

impl ResolverContextBuilder {
    /// Route lookups to an embedder-supplied backend instead of the system
    /// resolver.
    pub fn custom_backend(mut self, vtable: Arc<dyn CustomResolverVtable>) -> Self {
        self.vtable = Some(vtable);
        self
    }

    /// Replace the socket-based source address probe used for sorting.
    pub fn source_probe(mut self, probe: Arc<dyn SourceAddrProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> io::Result<ResolverContext> {
        let config = self.config;

        let (socket_probe, probe): (Option<Arc<SocketSourceAddrProbe>>, Arc<dyn SourceAddrProbe>) =
            match self.probe {
                Some(probe) => (None, probe),
                None => {
                    let socket_probe = Arc::new(SocketSourceAddrProbe::new());
                    (
                        Some(Arc::clone(&socket_probe)),
                        socket_probe as Arc<dyn SourceAddrProbe>,
                    )
                }
            };
        let sorter = if config.sort_results {
            AddressSorter::new(probe)
        } else {
            AddressSorter::passthrough()
        };

        let backend: Arc<dyn Resolve> = match self.vtable {
            Some(vtable) => {
                tracing::debug!("using custom resolver backend");
                Arc::new(CustomResolver::new(vtable, sorter.clone()))
            }
            None => Arc::new(GaiResolver::with_pool(
                sorter.clone(),
                config.worker_threads,
                config.resolve_timeout,
            )?),
        };

        let events = Arc::new(EventQueue::start(&config.event_thread_name)?);
        tracing::debug!(?config, "resolver context initialized");

        Ok(ResolverContext {
            registry: SchemeRegistry::new(config.scheme_capacity),
            socket_probe,
            sorter,
            backend,
            events,
            attempts: Arc::new(ResolutionAttempts::new()),
            shut_down: AtomicBool::new(false),
            config,
        })
    }
}

/// Process-wide resolution state.
///
/// All operations panic once [`shutdown`](Self::shutdown) has run; using a
/// torn-down resolver is a lifecycle bug in the embedder.
pub struct ResolverContext {
    registry: SchemeRegistry,

    /// Present when the context owns the probe sockets.
    socket_probe: Option<Arc<SocketSourceAddrProbe>>,

    sorter: AddressSorter,

    backend: Arc<dyn Resolve>,

    events: Arc<EventQueue>,

    attempts: Arc<ResolutionAttempts>,

    shut_down: AtomicBool,

    config: ResolverContextConfig,
}

impl ResolverContext {
    pub fn builder(config: ResolverContextConfig) -> ResolverContextBuilder {
        ResolverContextBuilder {
            config,
            vtable: None,
            probe: None,
        }
    }

    /// Starts a context backed by the system resolver.
    pub fn init(config: ResolverContextConfig) -> io::Result<Self> {
        Self::builder(config).build()
    }

    /// Starts a context backed by an embedder-supplied resolver.
    pub fn init_with_backend(
        config: ResolverContextConfig,
        vtable: Arc<dyn CustomResolverVtable>,
    ) -> io::Result<Self> {
        Self::builder(config).custom_backend(vtable).build()
    }

    pub fn config(&self) -> &ResolverContextConfig {
        &self.config
    }

    /// Registers a host:port parser. Panics on a duplicate scheme or a full
    /// table.
    pub fn register_scheme(&self, parser: impl HostPortParser + 'static) {
        self.assert_running("register_scheme");
        self.registry.register(parser);
    }

    pub fn lookup_scheme(&self, scheme: &str) -> Option<SchemeHandle> {
        self.assert_running("lookup_scheme");
        self.registry.lookup(scheme)
    }

    /// Splits a target into host and optional port. `scheme://rest` is
    /// parsed by the scheme's registered handler, anything else by the
    /// default codec.
    pub fn split_target(&self, target: &str) -> Result<(String, Option<String>), NetError> {
        self.assert_running("split_target");
        match target.split_once("://") {
            Some((scheme, rest)) => self.handler(scheme)?.split_host_port(rest),
            None => hostport::split_host_port(target),
        }
    }

    /// Joins a host and port with the syntax of `scheme`.
    pub fn join_host_port(&self, scheme: &str, host: &str, port: u16) -> Result<String, NetError> {
        self.assert_running("join_host_port");
        self.handler(scheme)?.join_host_port(host, port)
    }

    /// Starts resolving `target`. `on_done` runs exactly once on the thread
    /// chosen by `delivery`, unless the request is orphaned first. A result
    /// already handed to the delivery thread is delivered even if the
    /// request is orphaned afterwards.
    pub fn resolve(
        &self,
        target: &str,
        default_port: Option<&str>,
        delivery: Delivery,
        on_done: OnDone,
    ) -> RequestHandle {
        self.assert_running("resolve");
        self.attempts.record_start();
        let on_done = self.wrap_callback(delivery, on_done);

        match self.target_name(target, default_port) {
            Ok(name) => self.backend.resolve_name(name, on_done),
            Err(e) => {
                tracing::debug!(name = %target, error = %e, "rejecting target");
                let completion = Completion::new(target, on_done);
                completion.complete(Err(e));
                RequestHandle::new(completion)
            }
        }
    }

    /// Resolves `target` on the calling thread.
    pub fn resolve_blocking(
        &self,
        target: &str,
        default_port: Option<&str>,
    ) -> Result<Addresses, NetError> {
        self.assert_running("resolve_blocking");
        self.attempts.record_start();
        let result = self
            .target_name(target, default_port)
            .and_then(|name| self.backend.resolve_name_blocking(&name));
        record_outcome(&self.attempts, &result);
        result
    }

    /// Sorts `addrs` in destination preference order.
    pub fn sort(&self, addrs: &mut Vec<ResolvedAddress>) {
        self.assert_running("sort");
        self.sorter.sort(addrs);
    }

    /// Runs `event` on the delivery thread. Returns `false` if delivery has
    /// stopped.
    pub fn enqueue(&self, event: impl FnOnce() + Send + 'static) -> bool {
        self.assert_running("enqueue");
        self.events.enqueue(event)
    }

    pub fn attempts(&self) -> &ResolutionAttempts {
        &self.attempts
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Tears down the scheme table, closes the probe sockets and stops the
    /// delivery thread. Undelivered callbacks are dropped. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("shutting down resolver context");
        self.registry.shutdown();
        if let Some(probe) = &self.socket_probe {
            probe.shutdown();
        }
        self.events.abort();
    }

    fn assert_running(&self, operation: &str) {
        if self.is_shut_down() {
            tracing::error!(operation, "resolver context used after shutdown");
            panic!("resolver context used after shutdown ({})", operation);
        }
    }

    fn handler(&self, scheme: &str) -> Result<SchemeHandle, NetError> {
        self.registry
            .lookup(scheme)
            .ok_or_else(|| NetError::UnknownScheme {
                scheme: scheme.to_string(),
            })
    }

    /// Normalizes a scheme-qualified target to the default syntax the
    /// backends parse.
    fn target_name(&self, target: &str, default_port: Option<&str>) -> Result<Name, NetError> {
        let name = if target.contains("://") {
            let (host, port) = self.split_target(target)?;
            match port {
                Some(port) => Name::new(hostport::join_host_port(&host, port)),
                None => Name::new(hostport::bracket_host(&host).into_owned()),
            }
        } else {
            Name::new(target)
        };
        Ok(match default_port {
            Some(port) => name.with_default_port(port),
            None => name,
        })
    }

    fn wrap_callback(&self, delivery: Delivery, on_done: OnDone) -> OnDone {
        let on_done = match delivery {
            Delivery::Inline => on_done,
            Delivery::EventThread => {
                let events = Arc::clone(&self.events);
                Box::new(move |result| {
                    events.enqueue(move || on_done(result));
                })
            }
        };
        let attempts = Arc::clone(&self.attempts);
        Box::new(move |result| {
            record_outcome(&attempts, &result);
            on_done(result);
        })
    }
}

fn record_outcome(attempts: &ResolutionAttempts, result: &Result<Addresses, NetError>) {
    match result {
        Ok(addrs) => attempts.record_success(addrs.len()),
        Err(e) => attempts.record_failure(e),
    }
}

impl Resolve for ResolverContext {
    fn resolve_name(&self, name: Name, on_done: OnDone) -> RequestHandle {
        self.resolve(name.as_str(), name.default_port(), Delivery::Inline, on_done)
    }

    fn resolve_name_blocking(&self, name: &Name) -> Result<Addresses, NetError> {
        self.resolve_blocking(name.as_str(), name.default_port())
    }
}

impl Drop for ResolverContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("sorter", &self.sorter)
            .field("events", &self.events)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

static GLOBAL: RwLock<Option<Arc<ResolverContext>>> = RwLock::new(None);

/// Installs the process-wide context, returning the one it replaces.
pub fn set_global(context: Arc<ResolverContext>) -> Option<Arc<ResolverContext>> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(context)
}

/// The process-wide context. Panics if none was installed.
pub fn global() -> Arc<ResolverContext> {
    match try_global() {
        Some(context) => context,
        None => {
            tracing::error!("resolver used before init");
            panic!("resolver used before init: call set_global first");
        }
    }
}

pub fn try_global() -> Option<Arc<ResolverContext>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
