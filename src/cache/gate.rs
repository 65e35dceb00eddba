//! The page cache gate.
//!
//! Runs before the handler. Parameterless `GET` requests whose URL the policy
//! covers are looked up in the backend; a hit ends the request with the stored
//! page, a miss marks the request [`Cacheable`] so the gate's post-plugin can
//! store the rendered page under the same key.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    key::{CacheKey, NAMESPACE},
    policy::{CachePolicy, accepts_request},
    registry::DataSources,
};
use crate::{
    Response, StatusCode,
    context::Context,
    flow::{CacheDecision, Flow},
    pipeline::{Plugin, PluginFuture},
    session::{self, NoSession, SessionHandle, SessionLookup},
};

/// Left in the request extensions when the page may be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cacheable {
    /// Key the page was looked up under.
    pub key: CacheKey,
    /// Registry name of the backend that was queried.
    pub source: String,
}

/// Decides whether the request in `ctx` can be answered from the page cache.
///
/// Never fails: a missing backend, a suppressing session variable, an
/// ineligible URL, a missing `Host`, a miss and a backend error all yield
/// [`Flow::Forward`].
/// Only a non-empty stored payload yields [`Flow::ServeCached`].
pub async fn evaluate(
    ctx: &mut Context,
    session: &dyn SessionLookup,
    policy: &CachePolicy,
    sources: &DataSources,
) -> CacheDecision {
    info!("page cache gate started");
    // A rebooted request is judged afresh.
    ctx.extensions_mut().remove::<Cacheable>();

    let request = ctx.request();
    if !accepts_request(request) {
        debug!(method = %request.method(), "request has parameters or is not a GET, not cacheable");
        return Flow::Forward;
    }

    let Some(backend) = sources.resolve(policy) else {
        return Flow::Forward;
    };

    if let Some(variable) = session::suppressing_variable(policy, session) {
        debug!(variable, "page cache disabled by session variable");
        return Flow::Forward;
    }

    let Some(reason) = policy.match_uri(request.request_uri()) else {
        debug!(uri = request.request_uri(), "URL not covered by cache policy");
        return Flow::Forward;
    };
    let Some(key) = CacheKey::for_request(request) else {
        debug!(uri = request.request_uri(), "request has no usable Host header, not cacheable");
        return Flow::Forward;
    };
    debug!(?reason, %key, "page is cacheable");

    ctx.extensions_mut().insert(Cacheable {
        key: key.clone(),
        source: backend.name().to_owned(),
    });

    let lookup = {
        let scope = backend.scoped(NAMESPACE);
        scope.get(key.as_str()).await
    };

    match lookup {
        Ok(Some(payload)) if !payload.is_empty() => {
            debug!(%key, bytes = payload.len(), "serving page from cache");
            Flow::ServeCached(payload)
        }
        Ok(_) => {
            debug!(%key, "page cache miss");
            Flow::Forward
        }
        Err(e) => {
            warn!(%key, source = backend.name(), error = %e, "page cache lookup failed");
            Flow::Forward
        }
    }
}

/// Stores a freshly rendered page for a request the gate marked [`Cacheable`].
///
/// Only `200 OK` responses with a body are stored. Returns `true` when the
/// page was written.
pub async fn write_back(
    ctx: &Context,
    response: &Response,
    policy: &CachePolicy,
    sources: &DataSources,
) -> bool {
    let Some(mark) = ctx.extensions().get::<Cacheable>() else {
        return false;
    };

    if response.status() != StatusCode::Ok || response.payload().is_empty() {
        debug!(key = %mark.key, status = %response.status(), "response not stored in page cache");
        return false;
    }

    let Some(backend) = sources.get(&mark.source) else {
        warn!(source = %mark.source, "cache data source disappeared before write-back");
        return false;
    };

    let scope = backend.scoped(NAMESPACE);
    match scope
        .set(mark.key.as_str(), response.payload().clone(), policy.ttl)
        .await
    {
        Ok(()) => {
            debug!(key = %mark.key, bytes = response.payload().len(), "page stored in cache");
            true
        }
        Err(e) => {
            warn!(key = %mark.key, source = %mark.source, error = %e, "page cache write failed");
            false
        }
    }
}

/// Pipeline plugin wrapping [`evaluate`] and [`write_back`].
///
/// The session is taken from the [`SessionHandle`] in the request extensions;
/// without one the request is treated as having an empty session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pagegate::cache::{BackendHandle, CacheGate, CachePolicy, DataSources, MemoryStore};
/// use pagegate::pipeline::Pipeline;
/// use pagegate::{Context, Response, StatusCode};
///
/// let sources = DataSources::new().with(BackendHandle::new("cache", MemoryStore::new()));
/// let gate = CacheGate::new(CachePolicy::default(), sources);
///
/// let pipeline = Pipeline::new(|_ctx: &Context| async {
///     Response::new(StatusCode::Ok).body("<h1>home</h1>")
/// })
/// .plugin(Arc::new(gate));
/// ```
#[derive(Debug, Clone)]
pub struct CacheGate {
    policy: Arc<CachePolicy>,
    sources: Arc<DataSources>,
}

impl CacheGate {
    pub fn new(policy: CachePolicy, sources: DataSources) -> Self {
        Self::shared(Arc::new(policy), Arc::new(sources))
    }

    pub fn shared(policy: Arc<CachePolicy>, sources: Arc<DataSources>) -> Self {
        Self { policy, sources }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }
}

impl Plugin for CacheGate {
    fn preplugin<'a>(&'a self, ctx: &'a mut Context) -> PluginFuture<'a> {
        Box::pin(async move {
            let session = ctx.extensions().get::<SessionHandle>().cloned();
            let session: &dyn SessionLookup = match &session {
                Some(handle) => &*handle.0,
                None => &NoSession,
            };
            evaluate(ctx, session, &self.policy, &self.sources).await
        })
    }

    fn postplugin<'a>(&'a self, ctx: &'a mut Context, response: &'a Response) -> PluginFuture<'a> {
        Box::pin(async move {
            write_back(ctx, response, &self.policy, &self.sources).await;
            Flow::Forward
        })
    }
}
