//! Host:port text codec.
//!
//! The default syntax is `host:port`, with the host wrapped in brackets when
//! it contains a colon (numeric IPv6). Schemes that need another syntax
//! register a [`HostPortParser`](super::scheme::HostPortParser) instead.

use crate::base::neterror::NetError;
use std::borrow::Cow;
use std::fmt::Display;

/// Service name used when a target names no port and the caller has no
/// better default.
pub const DEFAULT_SECURE_PORT: &str = "https";

/// Joins a host and port, bracketing hosts that contain a colon.
pub fn join_host_port(host: &str, port: impl Display) -> String {
    format!("{}:{}", bracket_host(host), port)
}

/// Host as it appears in a joined name: IPv6 literals get brackets.
pub fn bracket_host(host: &str) -> Cow<'_, str> {
    if host.contains(':') && !host.starts_with('[') {
        Cow::Owned(format!("[{}]", host))
    } else {
        Cow::Borrowed(host)
    }
}

/// Splits `name` into host and an optional port.
///
/// Accepted forms:
/// - `host:port`, `host`
/// - `[literal]:port`, `[literal]`
/// - a bare IPv6 literal with more than one colon and no brackets, taken
///   as a host with no port
///
/// An empty host, an unterminated bracket, or trailing junk after a bracket
/// is rejected. An empty port (`host:`) is returned as `None`.
pub fn split_host_port(name: &str) -> Result<(String, Option<String>), NetError> {
    let invalid = || NetError::InvalidHostPort {
        input: name.to_string(),
    };

    let (host, port) = if let Some(rest) = name.strip_prefix('[') {
        let close = rest.find(']').ok_or_else(invalid)?;
        let host = &rest[..close];
        let after = &rest[close + 1..];
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or_else(invalid)?),
        };
        // Brackets only make sense around something containing a colon.
        if !host.contains(':') {
            return Err(invalid());
        }
        (host, port)
    } else {
        match name.find(':') {
            None => (name, None),
            Some(colon) if name[colon + 1..].contains(':') => (name, None),
            Some(colon) => (&name[..colon], Some(&name[colon + 1..])),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.filter(|p| !p.is_empty()).map(str::to_string);
    Ok((host.to_string(), port))
}

/// Splits `name`, falling back to `default_port` when it names no port.
///
/// Fails with [`NetError::MissingPort`] when neither is available.
pub fn split_with_default(
    name: &str,
    default_port: Option<&str>,
) -> Result<(String, String), NetError> {
    let (host, port) = split_host_port(name)?;
    match port.or_else(|| default_port.filter(|p| !p.is_empty()).map(str::to_string)) {
        Some(port) => Ok((host, port)),
        None => Err(NetError::MissingPort {
            name: name.to_string(),
        }),
    }
}

/// Maps the service names the resolver understands without a services
/// database to their numeric ports.
pub fn named_port_to_numeric(port: &str) -> Option<&'static str> {
    match port {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    }
}

/// Parses a port that must be numeric.
pub fn parse_port(port: &str) -> Result<u16, NetError> {
    port.parse::<u16>().map_err(|_| NetError::InvalidPort {
        port: port.to_string(),
    })
}
