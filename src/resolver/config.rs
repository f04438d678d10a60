//! Resolver context configuration.

use crate::dns::DEFAULT_WORKER_THREADS;
use std::time::Duration;

/// Default size of the scheme table.
pub const DEFAULT_SCHEME_CAPACITY: usize = 8;

/// Configuration for a [`ResolverContext`](super::ResolverContext).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ResolverContextConfig {
    /// Maximum concurrent system lookups
    pub worker_threads: usize,
    /// Deadline for a system lookup; `None` waits for the OS
    pub resolve_timeout: Option<Duration>,
    /// Size of the scheme table
    pub scheme_capacity: usize,
    /// Name of the callback delivery thread
    pub event_thread_name: String,
    /// Sort results in RFC 6724 order before delivery
    pub sort_results: bool,
}

impl Default for ResolverContextConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            resolve_timeout: None,
            scheme_capacity: DEFAULT_SCHEME_CAPACITY,
            event_thread_name: "resolvnet-events".to_string(),
            sort_results: true,
        }
    }
}

impl ResolverContextConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system lookup concurrency.
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the system lookup deadline.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(timeout);
        self
    }

    /// Set the scheme table size.
    pub fn scheme_capacity(mut self, capacity: usize) -> Self {
        self.scheme_capacity = capacity;
        self
    }

    /// Set the delivery thread name.
    pub fn event_thread_name(mut self, name: impl Into<String>) -> Self {
        self.event_thread_name = name.into();
        self
    }

    /// Enable or disable destination sorting.
    pub fn sort_results(mut self, enabled: bool) -> Self {
        self.sort_results = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverContextConfig::default();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.resolve_timeout, None);
        assert_eq!(config.scheme_capacity, 8);
        assert_eq!(config.event_thread_name, "resolvnet-events");
        assert!(config.sort_results);
    }

    #[test]
    fn test_builder() {
        let config = ResolverContextConfig::new()
            .worker_threads(16)
            .resolve_timeout(Duration::from_secs(5))
            .scheme_capacity(2)
            .event_thread_name("dns-cb")
            .sort_results(false);

        assert_eq!(config.worker_threads, 16);
        assert_eq!(config.resolve_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.scheme_capacity, 2);
        assert_eq!(config.event_thread_name, "dns-cb");
        assert!(!config.sort_results);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial() {
        let config: ResolverContextConfig = serde_json::from_str(
            r#"{"worker_threads": 2, "resolve_timeout": {"secs": 3, "nanos": 0}}"#,
        )
        .unwrap();

        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.resolve_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.scheme_capacity, DEFAULT_SCHEME_CAPACITY);
        assert!(config.sort_results);
    }
}
