//! Session variable lookup consumed by the cache gate.
//!
//! Sessions are stored elsewhere; the gate only reads named variables and
//! asks whether they are truthy. A session reaches the gate through a
//! [`SessionHandle`] placed in the request [`Extensions`](crate::context::Extensions)
//! by whatever loaded it.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::cache::CachePolicy;

/// Read access to the current request's session variables.
pub trait SessionLookup: Send + Sync {
    /// Returns the variable's value, or `None` when it is not set.
    fn get(&self, name: &str) -> Option<Value>;
}

/// A session with no variables. Used when no handle was injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl SessionLookup for NoSession {
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Session variables held in memory.
///
/// # Examples
///
/// ```
/// use pagegate::session::{MemorySession, SessionLookup};
///
/// let session = MemorySession::new().with("noCache", true);
/// assert_eq!(session.get("noCache"), Some(serde_json::Value::Bool(true)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    vars: HashMap<String, Value>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl SessionLookup for MemorySession {
    fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

/// Shareable session reference stored in the request extensions.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn SessionLookup>);

impl SessionHandle {
    pub fn new(session: impl SessionLookup + 'static) -> Self {
        Self(Arc::new(session))
    }
}

/// Truthiness of a session value.
///
/// `null`, `false`, zero, the empty string, `"0"`, and empty arrays or
/// objects are falsy. Everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Returns the first configured no-cache variable that is truthy in `session`.
///
/// Variables are checked in configuration order and the scan stops at the
/// first hit.
pub fn suppressing_variable<'p>(
    policy: &'p CachePolicy,
    session: &dyn SessionLookup,
) -> Option<&'p str> {
    policy
        .session_no_cache
        .iter()
        .find(|name| session.get(name).is_some_and(|value| is_truthy(&value)))
        .map(String::as_str)
}

/// Returns `true` when a session variable disables caching for this request.
pub fn is_suppressed(policy: &CachePolicy, session: &dyn SessionLookup) -> bool {
    suppressing_variable(policy, session).is_some()
}
