//! Cache policy: which requests may be answered from the page cache.
//!
//! A policy is read from the `x-temma-cache` section of a JSON config
//! document:
//!
//! ```json
//! {
//!     "x-temma-cache": {
//!         "source": "pages",
//!         "sessionNoCache": ["admin", "preview"],
//!         "url": ["/", "/about"],
//!         "prefix": ["/blog/"],
//!         "ttl": 3600
//!     }
//! }
//! ```
//!
//! Every key is optional. With neither `url` nor `prefix` the policy accepts
//! every URL.

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::http::{Method, Request};

/// Name of the config section holding the cache policy.
pub const CONFIG_SECTION: &str = "x-temma-cache";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid cache policy: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cache eligibility rules for one deployment.
///
/// `None` and an empty list are different things for `urls` and `prefixes`:
/// only when both are `None` does the policy match every URL.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CachePolicy {
    /// Data source to use instead of the registry's `"cache"` entry.
    pub source: Option<String>,
    /// Session variables that disable caching when truthy, checked in order.
    #[serde(deserialize_with = "one_or_many")]
    pub session_no_cache: Vec<String>,
    /// Request URIs that match exactly.
    #[serde(rename = "url", deserialize_with = "optional_set")]
    pub urls: Option<HashSet<String>>,
    /// Request URI prefixes, scanned in order.
    #[serde(rename = "prefix", deserialize_with = "optional_list")]
    pub prefixes: Option<Vec<String>>,
    /// Lifetime of entries written back after a miss. `None` keeps them
    /// until the store evicts them.
    #[serde(deserialize_with = "seconds")]
    pub ttl: Option<Duration>,
}

/// Why a URI matched a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriMatch<'a> {
    /// No URL rules configured.
    Open,
    /// Listed in `url`.
    Exact,
    /// Starts with this `prefix` entry.
    Prefix(&'a str),
}

impl CachePolicy {
    /// Parses a bare policy object.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Json`] if `json` is not valid JSON or a key has
    /// the wrong shape.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Extracts the policy from a whole config document.
    ///
    /// A document without an `x-temma-cache` section yields the default,
    /// match-all policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Json`] if the section is present but malformed.
    pub fn from_config(document: &Value) -> Result<Self, PolicyError> {
        match document.get(CONFIG_SECTION) {
            Some(section) => Ok(Self::deserialize(section)?),
            None => Ok(Self::default()),
        }
    }

    /// Returns `true` when no URL rule is configured.
    pub fn is_open(&self) -> bool {
        self.urls.is_none() && self.prefixes.is_none()
    }

    /// Applies the URL rules to a request URI.
    ///
    /// Prefixes are compared as plain strings, so `/blog` also matches
    /// `/blogroll`.
    pub fn match_uri(&self, uri: &str) -> Option<UriMatch<'_>> {
        if self.is_open() {
            return Some(UriMatch::Open);
        }
        if self.urls.as_ref().is_some_and(|urls| urls.contains(uri)) {
            return Some(UriMatch::Exact);
        }
        self.prefixes
            .iter()
            .flatten()
            .find(|prefix| uri.starts_with(prefix.as_str()))
            .map(|prefix| UriMatch::Prefix(prefix))
    }

    pub fn matches_uri(&self, uri: &str) -> bool {
        self.match_uri(uri).is_some()
    }

    /// Full eligibility check: request shape first, then URL rules.
    pub fn is_eligible(&self, request: &Request) -> bool {
        accepts_request(request) && self.matches_uri(request.request_uri())
    }
}

/// Only parameterless `GET` requests can ever be cached.
pub fn accepts_request(request: &Request) -> bool {
    request.method() == &Method::Get && !request.has_query()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?
        .map(Vec::from)
        .unwrap_or_default())
}

fn optional_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(Vec::from))
}

fn optional_set<'de, D>(deserializer: D) -> Result<Option<HashSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_list(deserializer)?.map(|items| items.into_iter().collect()))
}

fn seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}
