//! Plugin pipeline — pre-plugins, the handler, post-plugins.
//!
//! Each request runs every plugin's [`Plugin::preplugin`] in registration
//! order, then the handler, then every [`Plugin::postplugin`]. Each stage
//! returns a [`Flow`]:
//!
//! - [`Flow::Forward`] — continue with the next stage.
//! - [`Flow::ServeCached`] — stop and answer `200 OK` with the given bytes as
//!   the full body. No later stage runs.
//! - [`Flow::Reboot`] — start over from the first pre-plugin with the same
//!   context. After [`MAX_REBOOTS`] restarts the request fails with `500`.

use std::{future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::{Request, Response, StatusCode, context::Context, flow::Flow};

/// Restarts allowed per request before the pipeline gives up.
pub const MAX_REBOOTS: usize = 8;

/// Boxed future returned by plugin stages.
pub type PluginFuture<'a> = Pin<Box<dyn Future<Output = Flow> + Send + 'a>>;

/// A stage that runs around the handler.
///
/// # Contract
///
/// - Implementations must be `Send + Sync`; one instance serves all requests.
/// - Futures borrow the context only for the duration of the stage.
///
/// # Examples
///
/// ```rust,no_run
/// use pagegate::{Context, flow::Flow, pipeline::{Plugin, PluginFuture}};
///
/// struct Noop;
///
/// impl Plugin for Noop {
///     fn preplugin<'a>(&'a self, _ctx: &'a mut Context) -> PluginFuture<'a> {
///         Box::pin(async { Flow::Forward })
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Runs before the handler.
    fn preplugin<'a>(&'a self, ctx: &'a mut Context) -> PluginFuture<'a>;

    /// Runs after the handler with its response. Forwards by default.
    fn postplugin<'a>(&'a self, ctx: &'a mut Context, response: &'a Response) -> PluginFuture<'a> {
        let _ = (ctx, response);
        Box::pin(async { Flow::Forward })
    }
}

/// Conversion trait for async handler functions.
///
/// Any `Fn(&Context) -> impl Future<Output = Response> + Send + 'static`
/// implements it. The returned future must not borrow the context; copy what
/// it needs out first.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: &Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(&Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: &Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// A handler wrapped by an ordered list of plugins.
///
/// # Examples
///
/// ```rust,no_run
/// use pagegate::{Context, Request, Response, StatusCode, pipeline::Pipeline};
///
/// # async fn example(request: Request) {
/// let pipeline = Pipeline::new(|ctx: &Context| {
///     let path = ctx.request().path().to_owned();
///     async move { Response::new(StatusCode::Ok).body(path) }
/// });
/// let response = pipeline.dispatch(request).await;
/// # }
/// ```
pub struct Pipeline {
    plugins: Vec<Arc<dyn Plugin>>,
    handler: Arc<dyn IntoHandler>,
}

impl Pipeline {
    pub fn new(handler: impl IntoHandler) -> Self {
        Self {
            plugins: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Appends a plugin. Plugins run in the order they are added.
    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs `request` through the plugins and the handler.
    ///
    /// Emits one `tracing::info!` line per request:
    ///
    /// ```text
    /// METHOD /path - STATUS (duration)
    /// ```
    pub async fn dispatch(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();
        let path = request.path().to_owned();

        let mut ctx = Context::new(request);
        let response = self.run(&mut ctx).await;

        info!(
            "{} {} - {} ({:?})",
            method,
            path,
            response.status().as_u16(),
            start.elapsed()
        );
        response
    }

    async fn run(&self, ctx: &mut Context) -> Response {
        let mut reboots = 0;
        loop {
            if let Some(response) = self.run_once(ctx).await {
                return response;
            }
            reboots += 1;
            if reboots > MAX_REBOOTS {
                error!(reboots, "flow rebooted too many times, giving up");
                return Response::new(StatusCode::InternalServerError)
                    .body("Request processing looped");
            }
            debug!(reboots, "flow reboot");
        }
    }

    // `None` means a stage asked for a reboot.
    async fn run_once(&self, ctx: &mut Context) -> Option<Response> {
        for plugin in &self.plugins {
            match plugin.preplugin(ctx).await {
                Flow::Forward => {}
                Flow::ServeCached(body) => return Some(cached_response(body)),
                Flow::Reboot => return None,
            }
        }

        let response = self.handler.call(ctx).await;

        for plugin in &self.plugins {
            match plugin.postplugin(ctx, &response).await {
                Flow::Forward => {}
                Flow::ServeCached(body) => return Some(cached_response(body)),
                Flow::Reboot => return None,
            }
        }

        Some(response)
    }
}

fn cached_response(body: Bytes) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/html; charset=utf-8")
        .body_bytes(body)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        cache::{BackendHandle, CacheGate, CachePolicy, DataSources, MemoryStore, Store},
        session::{MemorySession, SessionHandle},
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn get(uri: &str) -> Request {
        let raw = format!("GET {uri} HTTP/1.1\r\nHost: example.com\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn counting_pipeline(calls: Arc<AtomicUsize>) -> Pipeline {
        Pipeline::new(move |ctx: &Context| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let path = ctx.request().path().to_owned();
            async move { Response::new(StatusCode::Ok).body(format!("{path} #{n}")) }
        })
    }

    /// Records stage names into a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Plugin for Recorder {
        fn preplugin<'a>(&'a self, _ctx: &'a mut Context) -> PluginFuture<'a> {
            self.log.lock().unwrap().push(format!("pre:{}", self.name));
            Box::pin(async { Flow::Forward })
        }

        fn postplugin<'a>(
            &'a self,
            _ctx: &'a mut Context,
            _response: &'a Response,
        ) -> PluginFuture<'a> {
            self.log.lock().unwrap().push(format!("post:{}", self.name));
            Box::pin(async { Flow::Forward })
        }
    }

    /// Answers every request with a fixed body.
    struct Short(&'static [u8]);

    impl Plugin for Short {
        fn preplugin<'a>(&'a self, _ctx: &'a mut Context) -> PluginFuture<'a> {
            Box::pin(async { Flow::ServeCached(Bytes::from_static(self.0)) })
        }
    }

    /// Reboots the first `times` requests it sees.
    struct RebootTimes {
        remaining: AtomicUsize,
    }

    impl Plugin for RebootTimes {
        fn preplugin<'a>(&'a self, _ctx: &'a mut Context) -> PluginFuture<'a> {
            Box::pin(async {
                let left = self.remaining.load(Ordering::SeqCst);
                if left > 0 {
                    self.remaining.store(left - 1, Ordering::SeqCst);
                    Flow::Reboot
                } else {
                    Flow::Forward
                }
            })
        }
    }

    /// Injects a session handle, as a session loader would.
    struct InjectSession(MemorySession);

    impl Plugin for InjectSession {
        fn preplugin<'a>(&'a self, ctx: &'a mut Context) -> PluginFuture<'a> {
            ctx.extensions_mut()
                .insert(SessionHandle::new(self.0.clone()));
            Box::pin(async { Flow::Forward })
        }
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting_pipeline(calls.clone())
            .plugin(Arc::new(Recorder {
                name: "a",
                log: log.clone(),
            }))
            .plugin(Arc::new(Recorder {
                name: "b",
                log: log.clone(),
            }));
        assert_eq!(pipeline.len(), 2);

        let response = pipeline.dispatch(get("/x")).await;

        assert_eq!(response.payload().as_ref(), b"/x #1");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:a", "pre:b", "post:a", "post:b"]
        );
    }

    #[tokio::test]
    async fn serve_cached_skips_remaining_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting_pipeline(calls.clone())
            .plugin(Arc::new(Short(b"<p>stored</p>")))
            .plugin(Arc::new(Recorder {
                name: "late",
                log: log.clone(),
            }));

        let response = pipeline.dispatch(get("/")).await;

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.payload().as_ref(), b"<p>stored</p>");
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reboot_restarts_from_first_plugin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting_pipeline(calls.clone())
            .plugin(Arc::new(Recorder {
                name: "first",
                log: log.clone(),
            }))
            .plugin(Arc::new(RebootTimes {
                remaining: AtomicUsize::new(2),
            }));

        let response = pipeline.dispatch(get("/")).await;

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:first", "pre:first", "pre:first", "post:first"]
        );
    }

    #[tokio::test]
    async fn endless_reboot_fails_the_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting_pipeline(calls.clone()).plugin(Arc::new(RebootTimes {
            remaining: AtomicUsize::new(usize::MAX),
        }));

        let response = pipeline.dispatch(get("/")).await;

        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn page_cache_round_trip() {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let sources = DataSources::new().with(BackendHandle::shared("cache", store.clone()));
        let policy = CachePolicy::from_json_str(r#"{"prefix": ["/blog/"]}"#).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline =
            counting_pipeline(calls.clone()).plugin(Arc::new(CacheGate::new(policy, sources)));

        let first = pipeline.dispatch(get("/blog/post-1")).await;
        let second = pipeline.dispatch(get("/blog/post-1")).await;

        assert_eq!(first.payload().as_ref(), b"/blog/post-1 #1");
        assert_eq!(second.payload().as_ref(), b"/blog/post-1 #1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get("temma-cache:example.com:/blog/post-1").await.unwrap(),
            Some(Bytes::from_static(b"/blog/post-1 #1"))
        );

        let about = pipeline.dispatch(get("/about")).await;
        let about_again = pipeline.dispatch(get("/about")).await;
        assert_eq!(about.payload().as_ref(), b"/about #2");
        assert_eq!(about_again.payload().as_ref(), b"/about #3");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn session_plugin_disables_page_cache() {
        let store = Arc::new(MemoryStore::new());
        let sources = DataSources::new().with(BackendHandle::shared("cache", store.clone()));
        let policy = CachePolicy::from_json_str(r#"{"sessionNoCache": "noCache"}"#).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting_pipeline(calls.clone())
            .plugin(Arc::new(InjectSession(
                MemorySession::new().with("noCache", true),
            )))
            .plugin(Arc::new(CacheGate::new(policy, sources)));

        pipeline.dispatch(get("/")).await;
        pipeline.dispatch(get("/")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }
}
