//! Middleware composition and built-in middleware.
//!
//! A [`Middleware`] is a decorator: a function from one [`HandlerFn`] to
//! another. That makes pre/post logic, short-circuiting (return without
//! calling the wrapped handler), and error injection (return `Err` to hit the
//! error pipeline) all expressible with plain closures.
//!
//! Ordering contract: middleware registered *earlier* wraps (and therefore
//! runs outside of) everything registered after it. A tracing middleware
//! registered first observes every later middleware and the handler itself.
//!
//! Built-ins: [`recover`] (panic containment), [`compress`] (gzip response
//! bodies), and [`trace`] (per-request tracing event).

use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::HeaderValue;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};

use crate::context::Context;
use crate::error::Error;
use crate::handler::{Handler, HandlerFn};

/// A handler decorator. See the module docs for the ordering contract.
pub type Middleware = Arc<dyn Fn(HandlerFn) -> HandlerFn + Send + Sync>;

/// Wraps a plain closure into a [`Middleware`].
pub fn from_fn(f: impl Fn(HandlerFn) -> HandlerFn + Send + Sync + 'static) -> Middleware {
    Arc::new(f)
}

// ── MiddlewareStack ───────────────────────────────────────────────────────────

/// Ordered middleware composition.
///
/// New middleware is *prepended*, and composition folds the stored sequence
/// onto the route handler, so the first-registered middleware ends up as the
/// outermost wrapper. Groups snapshot the stack via `clone` at creation time.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    stack: Vec<Middleware>,
}

impl MiddlewareStack {
    /// Adds middleware ahead of everything already stored. Relative order
    /// within `middleware` is preserved.
    pub fn add(&mut self, middleware: impl IntoIterator<Item = Middleware>) {
        let mut stack: Vec<Middleware> = middleware.into_iter().collect();
        stack.append(&mut self.stack);
        self.stack = stack;
    }

    /// Composes the stack around `handler`, innermost-first, producing the
    /// final pipeline for a route.
    pub fn handle(&self, handler: HandlerFn) -> HandlerFn {
        let mut h = handler;
        for m in &self.stack {
            h = m(h);
        }
        h
    }
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

/// Contains panics from downstream handlers, converting them into a 500
/// routed through the error pipeline instead of tearing down the connection.
pub fn recover() -> Middleware {
    Arc::new(|next: HandlerFn| {
        (move |ctx: Context| {
            let next = Arc::clone(&next);
            let caught = ctx.clone();
            async move {
                match tokio::spawn(next.call(ctx)).await {
                    Ok(res) => res,
                    Err(e) if e.is_panic() => {
                        let payload = e.into_panic();
                        let msg = payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_owned())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "handler panicked".to_owned());
                        Err(caught.error(500, msg))
                    }
                    Err(e) => Err(Error::internal(format!("handler task failed: {e}"))),
                }
            }
        })
        .into_handler()
    })
}

/// Gzips the buffered response body when the client sends an
/// `Accept-Encoding` naming gzip.
///
/// Empty responses and responses already carrying a `Content-Encoding` pass
/// through unencoded. Failures pass through untouched too, so the error
/// pipeline renders uncompressed.
pub fn compress() -> Middleware {
    Arc::new(|next: HandlerFn| {
        (move |ctx: Context| {
            let next = Arc::clone(&next);
            async move {
                let accepts_gzip = ctx
                    .header(ACCEPT_ENCODING)
                    .is_some_and(|v| v.contains("gzip"));

                let res = next.call(ctx.clone()).await;
                if !accepts_gzip || res.is_err() {
                    return res;
                }

                let mut response = ctx.response();
                if response.size() == 0 || response.headers().contains_key(CONTENT_ENCODING) {
                    return res;
                }

                let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
                encoder.write_all(response.body()).map_err(Error::internal)?;
                let compressed = encoder.finish().map_err(Error::internal)?;

                response.replace_body(compressed);
                response.headers_mut().remove(CONTENT_LENGTH);
                response
                    .headers_mut()
                    .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                res
            }
        })
        .into_handler()
    })
}

/// Emits one tracing event per request: method, path, status, latency.
pub fn trace() -> Middleware {
    Arc::new(|next: HandlerFn| {
        (move |ctx: Context| {
            let next = Arc::clone(&next);
            async move {
                let start = Instant::now();
                let method = ctx.method().clone();
                let path = ctx.path().to_owned();
                let res = next.call(ctx.clone()).await;
                let status = ctx.response().status();
                tracing::info!(
                    %method,
                    path,
                    status,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "request"
                );
                res
            }
        })
        .into_handler()
    })
}
