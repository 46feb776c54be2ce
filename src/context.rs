//! Per-request context.
//!
//! A [`Context`] bundles everything a handler needs for one request: the
//! request head and collected body, matched path parameters, the buffered
//! [`Response`], lazily parsed query parameters, and a request-scoped
//! key-value store. It is cheaply cloneable and clones share the same inner
//! state, so middleware can keep a handle across the call to the next
//! handler and inspect the response afterwards.
//!
//! A context lives for exactly one request and is never shared between
//! concurrent request flows.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use bytes::Bytes;
use futures_util::stream;
use http::header::{AsHeaderName, CONTENT_TYPE, LOCATION};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bind::Binder;
use crate::error::{BoxError, Error};
use crate::mime;
use crate::params::{PathParams, ValueParams};
use crate::response::Response;

/// Cap on the in-memory size of a multipart form body.
const MAX_MULTIPART_SIZE: u64 = 32 << 20; // 32 MiB

type Store = HashMap<String, Arc<dyn Any + Send + Sync>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned lock only means a handler panicked mid-write; the buffered
    // state is still usable for error rendering.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The per-request façade handlers and middleware operate on.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    parts: Parts,
    body: Bytes,
    params: PathParams,
    charset: String,
    binder: Binder,
    response: Mutex<Response>,
    query: OnceLock<ValueParams>,
    store: Mutex<Option<Store>>,
}

impl Context {
    pub(crate) fn new(
        parts: Parts,
        body: Bytes,
        params: PathParams,
        binder: Binder,
        charset: String,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                parts,
                body,
                params,
                charset,
                binder,
                response: Mutex::new(Response::new()),
                query: OnceLock::new(),
                store: Mutex::new(None),
            }),
        }
    }

    // ── Request access ────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method {
        &self.inner.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.parts.uri
    }

    pub fn path(&self) -> &str {
        self.inner.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.parts.headers
    }

    /// A single request header as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.inner.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The collected request body.
    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    /// Parameters matched out of the request path.
    pub fn params(&self) -> &PathParams {
        &self.inner.params
    }

    // ── Response access ───────────────────────────────────────────────────────

    /// Guarded access to the buffered response, for header manipulation and
    /// introspection (status, bytes written). Do not hold the guard across an
    /// `.await`.
    pub fn response(&self) -> MutexGuard<'_, Response> {
        lock(&self.inner.response)
    }

    pub(crate) fn take_response(&self) -> Response {
        std::mem::take(&mut *self.response())
    }

    // ── Response writers ──────────────────────────────────────────────────────

    /// Serializes `value` as JSON and writes it with `code`.
    ///
    /// A serialization failure is returned without touching the response;
    /// the error pipeline is responsible for rendering it.
    pub fn json<T: Serialize>(&self, code: u16, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::internal(format!("failed to serialize json: {e}")))?;
        self.render(code, mime::APPLICATION_JSON, &body)
    }

    /// Writes `value` as `text/html` with `code`.
    pub fn html(&self, code: u16, value: &str) -> Result<(), Error> {
        self.render(code, mime::TEXT_HTML, value.as_bytes())
    }

    /// Writes `value` as `text/plain` with `code`.
    pub fn text(&self, code: u16, value: &str) -> Result<(), Error> {
        self.render(code, mime::TEXT_PLAIN, value.as_bytes())
    }

    /// Writes a 204 with an empty body and no content type.
    pub fn no_content(&self) -> Result<(), Error> {
        self.render(204, "", &[])
    }

    /// Sets the `Location` header and writes an empty body with `code`.
    ///
    /// Fails with a validation error, leaving the response untouched,
    /// unless `code` is in `300..=308` or is `201`.
    pub fn redirect(&self, code: u16, location: &str) -> Result<(), Error> {
        if !(300..=308).contains(&code) && code != 201 {
            return Err(Error::internal("invalid redirect status code"));
        }
        let location = HeaderValue::from_str(location)
            .map_err(|e| Error::internal(format!("invalid location header: {e}")))?;
        self.response().headers_mut().insert(LOCATION, location);
        self.render(code, "", &[])
    }

    /// Tags `cause` with `code`, producing the typed failure the dispatch
    /// layer renders through the registered error handlers.
    pub fn error(&self, code: u16, cause: impl Into<BoxError>) -> Error {
        Error::http(code, cause)
    }

    fn render(&self, code: u16, content_type: &str, body: &[u8]) -> Result<(), Error> {
        let mut res = self.response();
        if !content_type.is_empty() {
            let value = format!("{content_type}; charset={}", self.inner.charset);
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::internal(format!("invalid content-type header: {e}")))?;
            res.headers_mut().insert(CONTENT_TYPE, value);
        }
        res.set_status(code);
        res.write(body);
        Ok(())
    }

    // ── Body decoding ─────────────────────────────────────────────────────────

    /// Decodes the request body into `T` via the router's [`Binder`].
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = (*self.inner.binder)(self)?;
        serde_json::from_value(value)
            .map_err(|e| Error::http(400, format!("Unmarshal type error: {e}")))
    }

    // ── Parameters ────────────────────────────────────────────────────────────

    /// The raw query string, without the leading `?`.
    pub fn query_string(&self) -> &str {
        self.inner.parts.uri.query().unwrap_or("")
    }

    /// The parsed query string. Parsed once, cached for the request.
    pub fn query_params(&self) -> &ValueParams {
        self.inner
            .query
            .get_or_init(|| ValueParams::from_pairs(parse_pairs(self.query_string())))
    }

    /// Parses the request body as an urlencoded or multipart form, selected
    /// by the `Content-Type` header. Query string values are merged into the
    /// returned view, after the body's own values.
    pub async fn form_params(&self) -> Result<ValueParams, Error> {
        let ct = self.header(CONTENT_TYPE).unwrap_or("").to_owned();

        let mut params = if ct.contains(mime::MULTIPART_FORM) {
            self.parse_multipart(&ct).await?
        } else {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.inner.body)
                .map(ValueParams::from_pairs)
                .map_err(|e| Error::internal(format!("failed to parse form from request: {e}")))?
        };

        for (k, v) in parse_pairs(self.query_string()) {
            params.push(k, v);
        }
        Ok(params)
    }

    async fn parse_multipart(&self, content_type: &str) -> Result<ValueParams, Error> {
        let form_err =
            |e: multer::Error| Error::internal(format!("failed to parse form from request: {e}"));

        let boundary = multer::parse_boundary(content_type).map_err(form_err)?;
        let body = self.inner.body.clone();
        let stream = stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
        let constraints = multer::Constraints::new()
            .size_limit(multer::SizeLimit::new().whole_stream(MAX_MULTIPART_SIZE));
        let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

        let mut params = ValueParams::default();
        while let Some(field) = multipart.next_field().await.map_err(form_err)? {
            // File parts are not part of the value view.
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let text = field.text().await.map_err(form_err)?;
            params.push(name, text);
        }
        Ok(params)
    }

    // ── Request-scoped store ──────────────────────────────────────────────────

    /// Stores `value` under `key` for the remainder of the request.
    ///
    /// The store is created on first write and only ever merged into.
    pub fn set(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        lock(&self.inner.store)
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Arc::new(value));
    }

    /// Retrieves a value previously stored under `key`. Absent keys and type
    /// mismatches both yield `None`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        lock(&self.inner.store)
            .as_ref()?
            .get(key)
            .cloned()?
            .downcast::<T>()
            .ok()
    }
}

// Query strings never hard-fail: malformed pairs are dropped, matching what
// clients get from every mainstream server stack.
fn parse_pairs(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query).unwrap_or_default()
}
