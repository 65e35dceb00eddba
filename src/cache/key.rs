//! Page cache keys.

use std::fmt;

use crate::http::Request;

/// Namespace every page cache entry lives under in its backend.
pub const NAMESPACE: &str = "temma-cache";

/// Key of a cached page: `host:request_uri`.
///
/// Lookup and write-back both go through [`CacheKey::for_request`], so the
/// two always agree on the exact bytes. A request without a usable `Host`
/// has no key.
///
/// # Examples
///
/// ```
/// use pagegate::cache::CacheKey;
///
/// let key = CacheKey::new("example.com", "/blog/post-1");
/// assert_eq!(key.as_str(), "example.com:/blog/post-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(host: &str, request_uri: &str) -> Self {
        Self(format!("{host}:{request_uri}"))
    }

    /// `None` when the request has no usable `Host` header.
    pub fn for_request(request: &Request) -> Option<Self> {
        request
            .host()
            .map(|host| Self::new(host, request.request_uri()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
