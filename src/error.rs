//! Typed failures and centralized error rendering.
//!
//! Every fallible operation in trellis produces an [`Error`]. The type is a
//! tagged union: either the failure already knows which HTTP status it should
//! render as ([`Error::Http`]), or it does not and renders as a 500
//! ([`Error::Internal`]). There is no cause-chain inspection at dispatch
//! time; the tag *is* the classification.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::header::{ACCEPT, CONTENT_TYPE};
use serde_json::json;

use crate::context::Context;
use crate::handler::BoxFuture;

/// A type-erased error, the shape the hyper ecosystem passes at its seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Error ─────────────────────────────────────────────────────────────────────

/// A failure tagged with the HTTP status code it should render as.
#[derive(Debug)]
pub struct HttpError {
    pub code: u16,
    pub cause: BoxError,
}

impl HttpError {
    pub fn new(code: u16, cause: impl Into<BoxError>) -> Self {
        Self { code, cause: cause.into() }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cause.fmt(f)
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// The error type returned by handlers, middleware, and trellis itself.
///
/// Handlers usually build the `Http` variant through
/// [`Context::error`](crate::Context::error) or [`ResultExt::http_status`];
/// anything that bubbles up untagged is treated as an internal failure and
/// renders as a 500.
#[derive(Debug)]
pub enum Error {
    /// Failure carrying the status code it should render as.
    Http(HttpError),
    /// Unclassified failure. Renders as 500, cause preserved.
    Internal(BoxError),
}

impl Error {
    /// Tags `cause` with an HTTP status code.
    pub fn http(code: u16, cause: impl Into<BoxError>) -> Self {
        Self::Http(HttpError::new(code, cause))
    }

    /// Wraps `cause` without a status code; it will render as a 500.
    pub fn internal(cause: impl Into<BoxError>) -> Self {
        Self::Internal(cause.into())
    }

    /// The status code this failure renders as.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http(e) => e.code,
            Self::Internal(_) => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => e.fmt(f),
            Self::Internal(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => e.source(),
            Self::Internal(e) => Some(e.as_ref()),
        }
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

// ── ResultExt ─────────────────────────────────────────────────────────────────

/// Tags the failure of a `Result`, if any, with an HTTP status code.
///
/// An `Ok` passes through untouched; tagging a success is a no-op:
///
/// ```rust
/// use trellis::ResultExt;
///
/// let parsed = "42".parse::<i64>().http_status(400);
/// assert_eq!(parsed.unwrap(), 42);
///
/// let failed = "x".parse::<i64>().http_status(400);
/// assert_eq!(failed.unwrap_err().status_code(), 400);
/// ```
pub trait ResultExt<T> {
    fn http_status(self, code: u16) -> Result<T, Error>;
}

impl<T, E: Into<BoxError>> ResultExt<T> for Result<T, E> {
    fn http_status(self, code: u16) -> Result<T, Error> {
        self.map_err(|e| Error::http(code, e))
    }
}

// ── Error handlers ────────────────────────────────────────────────────────────

/// A type-erased error-rendering function: `(code, error, ctx) -> result`.
///
/// Returning `Err` from an error handler triggers the final-resort path: a
/// plain-text 500 written directly to the transport, bypassing the [`Context`].
pub type ErrorHandlerFn = Arc<dyn Fn(u16, Error, Context) -> BoxFuture + Send + Sync>;

/// Wraps an async error-rendering function into an [`ErrorHandlerFn`].
pub fn error_handler<F, Fut>(f: F) -> ErrorHandlerFn
where
    F: Fn(u16, Error, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |code, err, ctx| Box::pin(f(code, err, ctx)))
}

/// Per-status-code error renderers plus a default.
///
/// [`get`](ErrorHandlers::get) resolves the handler for a code, falling back
/// to the default when no code-specific handler is registered.
#[derive(Clone)]
pub struct ErrorHandlers {
    default: ErrorHandlerFn,
    handlers: HashMap<u16, ErrorHandlerFn>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self {
            default: error_handler(default_error_handler),
            handlers: HashMap::new(),
        }
    }

    pub fn get(&self, code: u16) -> ErrorHandlerFn {
        self.handlers
            .get(&code)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    pub fn set(&mut self, handlers: HashMap<u16, ErrorHandlerFn>) {
        self.handlers = handlers;
    }

    pub fn insert(&mut self, code: u16, handler: ErrorHandlerFn) {
        self.handlers.insert(code, handler);
    }

    pub fn set_default(&mut self, handler: ErrorHandlerFn) {
        self.default = handler;
    }
}

impl Default for ErrorHandlers {
    fn default() -> Self {
        Self::new()
    }
}

/// The default error renderer.
///
/// Negotiates on the request `Content-Type`, falling back to `Accept`: a
/// client speaking json gets `{"error": <cause>, "code": <code>}`, everyone
/// else gets the cause as plain text.
pub async fn default_error_handler(code: u16, err: Error, ctx: Context) -> Result<(), Error> {
    let ct = ctx
        .header(CONTENT_TYPE)
        .filter(|v| !v.is_empty())
        .or_else(|| ctx.header(ACCEPT))
        .unwrap_or("");

    if ct.contains("json") {
        ctx.json(code, &json!({ "error": err.to_string(), "code": code }))
    } else {
        ctx.text(code, &err.to_string())
    }
}
