//! Request-body decoding policy.
//!
//! A [`Binder`] validates a request and produces a JSON value tree;
//! [`Context::bind`](crate::Context::bind) then deserializes that tree into
//! the destination type. Replacing the binder on a router swaps the whole
//! policy: which methods may carry a body, which content types are
//! understood, and how decode failures are classified.

use std::sync::Arc;

use http::Method;
use http::header::CONTENT_TYPE;
use serde_json::Value;
use serde_json::error::Category;

use crate::context::Context;
use crate::error::Error;
use crate::mime;

/// The pluggable body-decoding policy.
pub type Binder = Arc<dyn Fn(&Context) -> Result<Value, Error> + Send + Sync>;

/// The default binding policy.
///
/// - GET and DELETE conventionally carry no body; binding them is a 400.
/// - An empty body is a 400.
/// - A JSON content type is decoded, with failures classified into 400s
///   naming the problem (type mismatch, syntax error, truncation).
/// - Any other content type is an unclassified failure. It carries no
///   status tag and therefore renders as a 500 through the default
///   classification.
pub fn default_binder(ctx: &Context) -> Result<Value, Error> {
    let method = ctx.method();
    if method == Method::GET || method == Method::DELETE {
        return Err(ctx.error(400, format!("Bind is not supported for {method} method")));
    }

    if ctx.body().is_empty() {
        return Err(ctx.error(400, "Request body cannot be empty"));
    }

    let ct = ctx.header(CONTENT_TYPE).unwrap_or("");
    if ct.starts_with(mime::APPLICATION_JSON) {
        return decode_json(ctx.body());
    }

    Err(Error::internal(format!("No support for content type '{ct}'")))
}

/// Decodes `body` as JSON, classifying failures into distinct 400 messages.
pub fn decode_json(body: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(body).map_err(|e| {
        let msg = match e.classify() {
            Category::Data => format!("Unmarshal type error: {e}"),
            Category::Syntax => format!(
                "Syntax error: line={}, column={}, error={e}",
                e.line(),
                e.column()
            ),
            Category::Eof | Category::Io => format!("Could not decode json: {e}"),
        };
        Error::http(400, msg)
    })
}
