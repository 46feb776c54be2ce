//! A registered route and its dispatch pipeline.
//!
//! Dispatch walks a fixed sequence per request: collect the body, build a
//! fresh [`Context`], compose the owning router's middleware around the
//! route's handler, invoke it, and on failure resolve the error handler
//! for the failure's status code and let it render. Only when the error
//! handler *itself* fails does dispatch bypass the context and write a
//! plain-text 500 straight to the transport.
//!
//! A route is immutable once registered, but it resolves middleware, error
//! handlers, and the binder through its owning router's configuration at
//! invocation time, so router-level changes apply to already-registered
//! routes.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use tracing::error;

use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::handler::HandlerFn;
use crate::params::PathParams;
use crate::router::{RouterConfig, read};

pub(crate) struct Route {
    method: Method,
    path: String,
    handler: HandlerFn,
    config: Arc<RouterConfig>,
}

impl Route {
    pub(crate) fn new(
        method: Method,
        path: String,
        handler: HandlerFn,
        config: Arc<RouterConfig>,
    ) -> Self {
        Self { method, path, handler, config }
    }

    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Runs one request through the full pipeline and produces the response.
    pub(crate) async fn serve<B>(
        &self,
        req: http::Request<B>,
        params: PathParams,
    ) -> http::Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let e: BoxError = e.into();
                return plain_error(400, &format!("failed to read request body: {e}"));
            }
        };

        let binder = Arc::clone(&read(&self.config.binder));
        let ctx = Context::new(parts, body, params, binder, self.config.charset.clone());

        let pipeline = read(&self.config.middleware).handle(Arc::clone(&self.handler));
        if let Err(err) = pipeline.call(ctx.clone()).await {
            if let Some(last_resort) = self.render_error(err, ctx.clone()).await {
                return last_resort;
            }
        }

        ctx.take_response().into_http()
    }

    /// Renders `err` through the error handler registered for its status
    /// code. Returns a response only on the final-resort path, when the
    /// error handler itself failed.
    async fn render_error(&self, err: Error, ctx: Context) -> Option<http::Response<Full<Bytes>>> {
        let code = err.status_code();
        let handler = read(&self.config.error_handlers).get(code);

        if let Err(render_err) = (*handler)(code, err, ctx).await {
            error!(code, %render_err, "error handler failed");
            return Some(plain_error(500, &render_err.to_string()));
        }
        None
    }
}

/// A bare plain-text response built outside the context abstraction. Used
/// for unmatched routes and for failures of the error pipeline itself.
pub(crate) fn plain_error(code: u16, message: &str) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::from(format!("{message}\n"))));
    *res.status_mut() =
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}
