//! Named data sources.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use super::{backend::BackendHandle, policy::CachePolicy};

/// Registry entry used when the policy names no source.
pub const DEFAULT_SOURCE: &str = "cache";

/// Backends available to the application, by name.
///
/// # Examples
///
/// ```
/// use pagegate::cache::{BackendHandle, CachePolicy, DataSources, MemoryStore};
///
/// let sources = DataSources::new().with(BackendHandle::new("cache", MemoryStore::new()));
/// let backend = sources.resolve(&CachePolicy::default()).unwrap();
/// assert_eq!(backend.name(), "cache");
/// ```
#[derive(Debug, Default, Clone)]
pub struct DataSources {
    sources: HashMap<String, Arc<BackendHandle>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under its own name.
    #[must_use]
    pub fn with(mut self, handle: BackendHandle) -> Self {
        self.insert(Arc::new(handle));
        self
    }

    /// Registers a shared handle, replacing any handle with the same name.
    pub fn insert(&mut self, handle: Arc<BackendHandle>) {
        self.sources.insert(handle.name().to_owned(), handle);
    }

    pub fn get(&self, name: &str) -> Option<Arc<BackendHandle>> {
        self.sources.get(name).cloned()
    }

    /// Picks the backend for `policy`: its `source` if set, else `"cache"`.
    ///
    /// Returns `None` when that entry does not exist; the page cache is then
    /// simply off.
    pub fn resolve(&self, policy: &CachePolicy) -> Option<Arc<BackendHandle>> {
        match policy.source.as_deref() {
            Some(name) => {
                let handle = self.get(name);
                if handle.is_none() {
                    warn!(source = name, "configured cache data source does not exist");
                }
                handle
            }
            None => {
                let handle = self.get(DEFAULT_SOURCE);
                if handle.is_none() {
                    debug!("no cache data source configured");
                }
                handle
            }
        }
    }
}
