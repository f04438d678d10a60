//! Name resolution.
//!
//! Provides pluggable resolver backends with:
//! - System resolver (getaddrinfo on a bounded thread pool)
//! - Embedder-supplied resolver through a vtable
//! - RFC 6724 destination address sorting
//! - Scheme-keyed host:port parsers
//!
//! # Architecture
//!
//! The [`Resolve`] trait is the backend abstraction. A request started with
//! [`Resolve::resolve_name`] reports through a one-shot callback and can be
//! orphaned through its [`RequestHandle`]; exactly one of the two happens.
//! Every successful result passes through [`AddressSorter`] before delivery.
//!
//! # Example
//!
//! ```rust,ignore
//! use resolvnet::dns::{AddressSorter, GaiResolver, Name, Resolve};
//!
//! let resolver = GaiResolver::new(AddressSorter::with_socket_probe())?;
//! let addrs = resolver.resolve(Name::new("example.com:443")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

pub mod address;
mod custom;
mod gai;
pub mod hostport;
mod request;
mod resolve;
pub mod scheme;
pub mod sort;
pub mod sourceaddr;

pub use address::{AddressFamily, Addresses, ResolvedAddress};
pub use custom::{CustomRequest, CustomResolver, CustomResolverVtable};
pub use gai::{GaiResolver, SocketAddrs, DEFAULT_WORKER_THREADS};
pub use request::{OnDone, RequestHandle, RequestState};
pub use resolve::{Name, Resolve, Resolving};
pub use scheme::{DefaultHostPortParser, HostPortParser, SchemeHandle, SchemeRegistry};
pub use sort::AddressSorter;
pub use sourceaddr::{SocketSourceAddrProbe, SourceAddr, SourceAddrProbe};

pub(crate) use request::Completion;
