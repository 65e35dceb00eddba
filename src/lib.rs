//! # pagegate
//!
//! A request-time page cache gate for HTTP/1.1 services.
//!
//! Before a page is rendered, the [`CacheGate`](cache::CacheGate) plugin
//! decides whether the request may be answered from a key-value backend. A hit
//! ends the request with the stored page; a miss marks the request so the
//! rendered page is stored for the next visitor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pagegate::cache::{BackendHandle, CacheGate, CachePolicy, DataSources, MemoryStore};
//! use pagegate::pipeline::Pipeline;
//! use pagegate::{Context, Request, Response, StatusCode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = serde_json::json!({ "x-temma-cache": { "prefix": ["/blog/"] } });
//! let policy = CachePolicy::from_config(&config)?;
//! let sources = DataSources::new().with(BackendHandle::new("cache", MemoryStore::new()));
//!
//! let pipeline = Pipeline::new(|ctx: &Context| {
//!     let path = ctx.request().path().to_owned();
//!     async move { Response::new(StatusCode::Ok).body(format!("<h1>{path}</h1>")) }
//! })
//! .plugin(Arc::new(CacheGate::new(policy, sources)));
//!
//! let (request, _) = Request::parse(b"GET /blog/hello HTTP/1.1\r\nHost: example.com\r\n\r\n")?;
//! let response = pipeline.dispatch(request).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod flow;
pub mod http;
pub mod pipeline;
pub mod session;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Context;
pub use flow::{CacheDecision, Flow};
pub use http::{Headers, Method, Request, Response, StatusCode};
