//! Process-level resolver lifecycle and configuration.

pub mod config;
pub mod context;

pub use config::ResolverContextConfig;
pub use context::{Delivery, ResolverContext, ResolverContextBuilder};
