//! Admission key derivation from inbound request metadata.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Header consulted by the forwarded-header strategy.
const FORWARDED_HEADER: &str = "x-forwarded-for";

/// Sentinel key used when no per-client identity can be derived.
const GLOBAL_KEY: &str = "global";

/// A key that identifies the caller for admission purposes.
///
/// Keys are compared by exact value. No normalization happens after
/// extraction: whatever the extractor produced is what the store indexes on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdmissionKey(String);

impl AdmissionKey {
    /// Create a key from an arbitrary caller identity.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create a key from a client IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// The sentinel key shared by all requests that carry no usable identity.
    pub fn global() -> Self {
        Self(GLOBAL_KEY.to_string())
    }

    /// Whether this is the shared sentinel key.
    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How admission keys are derived from inbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStrategy {
    /// Key on the originating network address.
    #[default]
    ClientAddress,
    /// Key on a trusted proxy header, falling back to the client address.
    ForwardedHeader,
    /// One shared bucket for the whole service.
    Global,
}

/// Derives an [`AdmissionKey`] from request metadata.
///
/// Extraction is infallible: inputs that cannot yield a per-client key
/// degrade to the sentinel global key. Admission control must never fail
/// the request path over a malformed header.
#[derive(Debug, Clone, Copy)]
pub struct KeyExtractor {
    strategy: KeyStrategy,
}

impl KeyExtractor {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self { strategy }
    }

    /// Derive the admission key for one request.
    pub fn extract(&self, remote_addr: Option<SocketAddr>, headers: &HeaderMap) -> AdmissionKey {
        match self.strategy {
            KeyStrategy::Global => AdmissionKey::global(),
            KeyStrategy::ClientAddress => client_key(remote_addr),
            KeyStrategy::ForwardedHeader => match forwarded_ip(headers) {
                Some(ip) => AdmissionKey::from_ip(ip),
                None => {
                    trace!("No usable forwarded header, falling back to client address");
                    client_key(remote_addr)
                }
            },
        }
    }
}

fn client_key(remote_addr: Option<SocketAddr>) -> AdmissionKey {
    match remote_addr {
        Some(addr) => AdmissionKey::from_ip(addr.ip()),
        None => AdmissionKey::global(),
    }
}

/// Parse the first entry of the forwarded header as an IP address.
///
/// `X-Forwarded-For` lists the client first, then each intermediate proxy.
/// Entries that do not parse as an IP are not trusted as identities.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(FORWARDED_HEADER)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(addr: &str) -> Option<SocketAddr> {
        Some(addr.parse().unwrap())
    }

    #[test]
    fn test_client_address_strategy() {
        let extractor = KeyExtractor::new(KeyStrategy::ClientAddress);
        let key = extractor.extract(remote("10.0.0.7:41234"), &HeaderMap::new());
        assert_eq!(key.as_str(), "10.0.0.7");
    }

    #[test]
    fn test_client_address_missing_falls_back_to_global() {
        let extractor = KeyExtractor::new(KeyStrategy::ClientAddress);
        let key = extractor.extract(None, &HeaderMap::new());
        assert!(key.is_global());
    }

    #[test]
    fn test_forwarded_header_strategy() {
        let extractor = KeyExtractor::new(KeyStrategy::ForwardedHeader);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        let key = extractor.extract(remote("10.0.0.1:80"), &headers);
        assert_eq!(key.as_str(), "203.0.113.9");
    }

    #[test]
    fn test_malformed_forwarded_header_falls_back_to_client_address() {
        let extractor = KeyExtractor::new(KeyStrategy::ForwardedHeader);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let key = extractor.extract(remote("10.0.0.1:80"), &headers);
        assert_eq!(key.as_str(), "10.0.0.1");
    }

    #[test]
    fn test_malformed_header_without_client_address_is_global() {
        let extractor = KeyExtractor::new(KeyStrategy::ForwardedHeader);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let key = extractor.extract(None, &headers);
        assert!(key.is_global());
    }

    #[test]
    fn test_global_strategy_ignores_identity() {
        let extractor = KeyExtractor::new(KeyStrategy::Global);
        let key = extractor.extract(remote("10.0.0.7:41234"), &HeaderMap::new());
        assert!(key.is_global());
    }

    #[test]
    fn test_key_equality_is_exact() {
        assert_eq!(AdmissionKey::new("k1"), AdmissionKey::new("k1"));
        assert_ne!(AdmissionKey::new("k1"), AdmissionKey::new("k2"));
    }
}
