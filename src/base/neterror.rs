use thiserror::Error;

/// Broad classification used by callers to pick a retry policy.
///
/// Invalid arguments are never worth retrying; lookup failures may succeed
/// later and are left to the caller's own backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    LookupFailure,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Malformed input
    #[error("unparseable host:port: '{input}'")]
    InvalidHostPort { input: String },
    #[error("no port in name '{name}'")]
    MissingPort { name: String },
    #[error("invalid port '{port}'")]
    InvalidPort { port: String },

    // Lookup failures
    #[error("Name not resolved for {domain}: {message}")]
    NameNotResolvedFor { domain: String, message: String },
    #[error("No addresses returned for {domain}")]
    EmptyResult { domain: String },
    #[error("Name resolution timed out for {domain}")]
    ResolutionTimedOut { domain: String },
    #[error("No handler registered for scheme '{scheme}'")]
    UnknownScheme { scheme: String },
    #[error("Resolver backend unavailable")]
    BackendUnavailable,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Builds a lookup failure carrying the backend's diagnostic text.
    pub fn lookup_failed(domain: impl Into<String>, message: impl Into<String>) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::InvalidHostPort { .. }
            | NetError::MissingPort { .. }
            | NetError::InvalidPort { .. } => ErrorKind::InvalidArgument,
            _ => ErrorKind::LookupFailure,
        }
    }

    /// Whether a caller-driven retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::LookupFailure
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::InvalidHostPort { .. } => -108,
            NetError::MissingPort { .. } => -110,
            NetError::InvalidPort { .. } => -312,
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::EmptyResult { .. } => -137,
            NetError::ResolutionTimedOut { .. } => -118,
            NetError::UnknownScheme { .. } => -302,
            NetError::BackendUnavailable => -119,
            NetError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for NetError {
    /// Reconstructs an error from its code. Variants that carry context come
    /// back with empty fields since the code alone does not preserve them.
    fn from(code: i32) -> Self {
        match code {
            -108 => NetError::InvalidHostPort { input: String::new() },
            -110 => NetError::MissingPort { name: String::new() },
            -312 => NetError::InvalidPort { port: String::new() },
            -105 => NetError::NameNotResolvedFor {
                domain: String::new(),
                message: String::new(),
            },
            -137 => NetError::EmptyResult { domain: String::new() },
            -118 => NetError::ResolutionTimedOut { domain: String::new() },
            -302 => NetError::UnknownScheme { scheme: String::new() },
            -119 => NetError::BackendUnavailable,
            _ => NetError::Unknown(code),
        }
    }
}
