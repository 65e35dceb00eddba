//! Key-value backends and namespace scoping.
//!
//! A [`Store`] is the raw key-value service. A [`BackendHandle`] wraps one for
//! the data-source registry and adds a namespace slot: while a namespace is
//! set, every key is stored as `"{namespace}:{key}"`.
//!
//! Handles are shared between concurrent requests, so the page cache never
//! touches the slot. It calls [`BackendHandle::scoped`], which returns a
//! [`Namespace`] guard carrying its own namespace. Keys built through the
//! guard are prefixed by the guard alone; plain handle calls made meanwhile
//! keep seeing the slot unchanged.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use thiserror::Error;

/// Errors reported by a [`Store`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend operation failed: {source}")]
    Store {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Boxed future returned by [`Store`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// A key-value store holding opaque byte payloads.
///
/// Implementations must be `Send + Sync`; one instance serves every request.
pub trait Store: Send + Sync {
    /// Fetch the value stored under `key`, or `None` on a miss.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Option<Duration>)
    -> StoreFuture<'a, ()>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// A named, shareable reference to a [`Store`] with a namespace slot.
pub struct BackendHandle {
    name: String,
    store: Arc<dyn Store>,
    namespace: Mutex<Option<String>>,
}

impl BackendHandle {
    pub fn new(name: impl Into<String>, store: impl Store + 'static) -> Self {
        Self::shared(name, Arc::new(store))
    }

    /// Wraps a store that is also referenced elsewhere.
    pub fn shared(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.into(),
            store,
            namespace: Mutex::new(None),
        }
    }

    /// Name under which the handle is registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace currently applied to keys, if any.
    pub fn namespace(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Sets or clears the namespace. Returns `self` so calls can be chained.
    ///
    /// The slot is visible to every user of the handle; requests sharing it
    /// should use [`scoped`](Self::scoped) instead.
    pub fn set_namespace(&self, namespace: Option<&str>) -> &Self {
        *self.slot() = namespace.map(str::to_owned);
        self
    }

    /// Fetch `key` under the current namespace.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        let key = self.qualify(key);
        self.store.get(&key).await
    }

    /// Store `value` under `key` in the current namespace.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        let key = self.qualify(key);
        self.store.set(&key, value, ttl).await
    }

    /// Delete `key` in the current namespace.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn remove(&self, key: &str) -> Result<(), BackendError> {
        let key = self.qualify(key);
        self.store.remove(&key).await
    }

    /// Returns a view of the store with every key under `namespace`.
    ///
    /// The handle's own slot is neither read nor written, so concurrent
    /// scopes and plain calls on the same handle stay independent.
    pub fn scoped(&self, namespace: &str) -> Namespace<'_> {
        Namespace {
            store: &*self.store,
            namespace: namespace.to_owned(),
        }
    }

    fn qualify(&self, key: &str) -> String {
        match self.slot().as_deref() {
            Some(namespace) => qualified(namespace, key),
            None => key.to_owned(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.namespace.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("name", &self.name)
            .field("namespace", &self.namespace())
            .finish_non_exhaustive()
    }
}

fn qualified(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// A namespace bound to a [`BackendHandle`]'s store for the guard's lifetime.
pub struct Namespace<'a> {
    store: &'a dyn Store,
    namespace: String,
}

impl Namespace<'_> {
    /// The namespace every key is stored under.
    pub fn name(&self) -> &str {
        &self.namespace
    }

    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        self.store.get(&qualified(&self.namespace, key)).await
    }

    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.store
            .set(&qualified(&self.namespace, key), value, ttl)
            .await
    }

    /// # Errors
    ///
    /// Propagates the store's [`BackendError`].
    pub async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.store.remove(&qualified(&self.namespace, key)).await
    }
}

impl fmt::Debug for Namespace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
