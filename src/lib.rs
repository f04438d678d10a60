//! # resolvnet
//!
//! Name resolution core for RPC clients.
//!
//! `resolvnet` turns `host:port` targets into connectable socket addresses
//! ordered by RFC 6724 destination preference, using either the system
//! resolver or one supplied by the embedder.
//!
//! ## Features
//!
//! - **Pluggable backends**: getaddrinfo on a bounded thread pool, or an
//!   embedder vtable
//! - **Exactly-once completion**: every request either reports its result or
//!   is orphaned, never both
//! - **Destination sorting**: RFC 6724 rules 1-10 with cached probe sockets
//! - **Scheme registry**: per-scheme host:port syntax
//! - **Delivery thread**: optional FIFO callback delivery off the lookup
//!   workers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resolvnet::resolver::{Delivery, ResolverContext, ResolverContextConfig};
//!
//! let ctx = ResolverContext::init(ResolverContextConfig::default())?;
//! let addrs = ctx.resolve_blocking("example.com", Some("https"))?;
//! println!("Connect to: {}", addrs[0]);
//!
//! let _handle = ctx.resolve(
//!     "localhost:50051",
//!     None,
//!     Delivery::EventThread,
//!     Box::new(|result| println!("{:?}", result)),
//! );
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions and attempt tracking
//! - [`dns`] - Backends, host:port codec, scheme table and address sorting
//! - [`event`] - Callback delivery thread
//! - [`resolver`] - Process-wide context and configuration

pub mod base;
pub mod dns;
pub mod event;
pub mod resolver;
