//! Page cache — serve rendered pages from a key-value backend.
//!
//! - [`policy`] — which requests are eligible, loaded from JSON config.
//! - [`key`] — `host:request_uri` keys under the `temma-cache` namespace.
//! - [`backend`] — the [`Store`] trait and namespaced [`BackendHandle`]s.
//! - [`registry`] — named data sources and default resolution.
//! - [`gate`] — the lookup before the handler and the write-back after it.

pub mod backend;
pub mod gate;
pub mod key;
pub mod memory;
pub mod policy;
pub mod registry;

pub use backend::{BackendError, BackendHandle, Namespace, Store, StoreFuture};
pub use gate::{CacheGate, Cacheable, evaluate, write_back};
pub use key::{CacheKey, NAMESPACE};
pub use memory::MemoryStore;
pub use policy::{CachePolicy, PolicyError, UriMatch, accepts_request};
pub use registry::{DEFAULT_SOURCE, DataSources};
