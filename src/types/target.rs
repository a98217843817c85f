//! Scan target identity and hostname resolution.
//!
//! A scan runs against exactly one host. The operator may name it by IP
//! literal or hostname; hostnames are resolved once, before any probe is
//! scheduled, and a failed lookup aborts the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A scan target that has been resolved to an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// The original input (hostname or IP string).
    pub original: String,
    /// The resolved IP address.
    pub ip: IpAddr,
}

impl ScanTarget {
    /// Create a new scan target.
    pub fn new(original: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            original: original.into(),
            ip,
        }
    }
}

impl From<IpAddr> for ScanTarget {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip.to_string(), ip)
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.original, self.ip)
        }
    }
}

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
}

/// Resolve a hostname or IP literal into a scan target.
///
/// IP literals never touch DNS. For hostnames the first address returned by
/// the resolver is used.
pub async fn resolve_target(input: &str) -> Result<ScanTarget, TargetError> {
    let input = input.trim();

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(ScanTarget::new(input, ip));
    }

    if !is_valid_hostname(input) {
        return Err(TargetError::InvalidFormat(input.to_string()));
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let response = resolver
        .lookup_ip(input)
        .await
        .map_err(|e| TargetError::DnsResolutionFailed(input.to_string(), e.to_string()))?;

    let ip = response
        .iter()
        .next()
        .ok_or_else(|| TargetError::NoAddressesFound(input.to_string()))?;

    debug!(hostname = input, %ip, "resolved target");
    Ok(ScanTarget::new(input, ip))
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters
    for label in s.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if !label.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return false;
        }
        if !label.ends_with(|c: char| c.is_ascii_alphanumeric()) {
            return false;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let target = resolve_target("192.168.1.1").await.unwrap();
        assert_eq!(target.ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(target.to_string(), "192.168.1.1");
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal() {
        let target = resolve_target("::1").await.unwrap();
        assert_eq!(target.ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_resolve_rejects_garbage() {
        let result = resolve_target("not a host!").await;
        assert!(matches!(result, Err(TargetError::InvalidFormat(_))));
    }

    #[test]
    fn test_display_with_hostname() {
        let target = ScanTarget::new("example.com", IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)));
        assert_eq!(target.to_string(), "example.com (93.184.216.34)");
    }

    #[test]
    fn test_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("sub.example.com."));
        assert!(is_valid_hostname("my-server"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("-invalid.com"));
        assert!(!is_valid_hostname("bad..dots"));
    }
}
