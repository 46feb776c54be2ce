//! Route registration, grouping, and request dispatch.
//!
//! One radix tree per HTTP method, O(path-length) lookup via [`matchit`].
//! Every router created by [`Router::group`] registers into the *same*
//! matching structure as its parent, so all routes, at any group depth, are
//! visible to one dispatch entry point. What a group does **not** share is
//! configuration: it takes a snapshot copy of the parent's middleware stack
//! at creation time and starts with a fresh, default-only set of error
//! handlers. Mutating either side afterwards does not affect the other.
//!
//! Registration is a startup-time phase; finish it before serving traffic.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use http_body_util::Full;
use hyper::body::Body;
use matchit::Router as PathMatcher;
use serde_json::Value;

use crate::bind::{Binder, default_binder};
use crate::context::Context;
use crate::error::{BoxError, Error, ErrorHandlerFn, ErrorHandlers};
use crate::handler::Handler;
use crate::middleware::{Middleware, MiddlewareStack};
use crate::params::PathParams;
use crate::route::{Route, plain_error};

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Per-router configuration, resolved by routes at invocation time.
pub(crate) struct RouterConfig {
    pub(crate) middleware: RwLock<MiddlewareStack>,
    pub(crate) error_handlers: RwLock<ErrorHandlers>,
    pub(crate) binder: RwLock<Binder>,
    pub(crate) charset: String,
}

type MatcherTrees = HashMap<Method, PathMatcher<Arc<Route>>>;

/// The application router.
///
/// Build it once at startup, register routes and middleware, then hand it to
/// [`Server::serve`](crate::Server::serve). Cloning a router yields another
/// handle onto the same routes and configuration.
#[derive(Clone)]
pub struct Router {
    matcher: Arc<RwLock<MatcherTrees>>,
    prefix: String,
    config: Arc<RouterConfig>,
    routes: Arc<Mutex<Vec<Arc<Route>>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            matcher: Arc::new(RwLock::new(HashMap::new())),
            prefix: "/".to_owned(),
            config: Arc::new(RouterConfig {
                middleware: RwLock::new(MiddlewareStack::default()),
                error_handlers: RwLock::new(ErrorHandlers::new()),
                binder: RwLock::new(Arc::new(default_binder)),
                charset: "utf-8".to_owned(),
            }),
            routes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // ── Registration ──────────────────────────────────────────────────────────

    pub fn get(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::GET, path, handler);
    }

    pub fn post(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::POST, path, handler);
    }

    pub fn put(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::PUT, path, handler);
    }

    pub fn delete(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::DELETE, path, handler);
    }

    pub fn options(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::OPTIONS, path, handler);
    }

    pub fn head(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::HEAD, path, handler);
    }

    pub fn patch(&self, path: &str, handler: impl Handler) {
        self.add_route(Method::PATCH, path, handler);
    }

    /// Creates a sub-router rooted under `prefix`.
    ///
    /// The group registers into the same matching structure as its parent,
    /// with routes joined under every ancestor prefix. Its middleware stack
    /// is a snapshot of the parent's at this moment; its error handlers start
    /// as an independent, default-only set; its binder is inherited.
    pub fn group(&self, prefix: &str) -> Router {
        Router {
            matcher: Arc::clone(&self.matcher),
            prefix: join_paths(&self.prefix, prefix),
            config: Arc::new(RouterConfig {
                middleware: RwLock::new(read(&self.config.middleware).clone()),
                error_handlers: RwLock::new(ErrorHandlers::new()),
                binder: RwLock::new(Arc::clone(&read(&self.config.binder))),
                charset: self.config.charset.clone(),
            }),
            routes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds middleware to this router. Middleware registered earlier wraps
    /// middleware registered later; see [`crate::middleware`].
    pub fn wrap(&self, middleware: Middleware) {
        write(&self.config.middleware).add([middleware]);
    }

    /// Replaces the per-status-code error handlers for this router.
    pub fn set_error_handlers(&self, handlers: HashMap<u16, ErrorHandlerFn>) {
        write(&self.config.error_handlers).set(handlers);
    }

    /// Registers one error handler for `code` on this router.
    pub fn set_error_handler(&self, code: u16, handler: ErrorHandlerFn) {
        write(&self.config.error_handlers).insert(code, handler);
    }

    /// Replaces the fallback error handler for this router.
    pub fn set_default_error_handler(&self, handler: ErrorHandlerFn) {
        write(&self.config.error_handlers).set_default(handler);
    }

    /// Replaces the body-decoding policy for this router.
    pub fn set_binder(
        &self,
        binder: impl Fn(&Context) -> Result<Value, Error> + Send + Sync + 'static,
    ) {
        *write(&self.config.binder) = Arc::new(binder);
    }

    /// Serves files from `dir` under `prefix`.
    ///
    /// A missing file renders a 404 through this router's error handlers,
    /// with a "could not find <path>" cause. Any other filesystem failure is
    /// an unclassified error (500). Path traversal out of `dir` is treated
    /// as not found.
    pub fn static_files(&self, prefix: &str, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let pattern = format!("{}/{{*file}}", prefix.trim_end_matches('/'));

        self.add_route(Method::GET, &pattern, move |ctx: Context| {
            let dir = dir.clone();
            async move {
                let rel = ctx.params().string("file").to_owned();
                let not_found = || ctx.error(404, format!("could not find {}", ctx.path()));

                if rel.split('/').any(|seg| seg == "..") {
                    return Err(not_found());
                }

                match tokio::fs::read(dir.join(&rel)).await {
                    Ok(data) => {
                        let mime = mime_guess::from_path(&rel).first_or_octet_stream();
                        let value = if mime.type_() == mime_guess::mime::TEXT {
                            format!("{}; charset=utf-8", mime.essence_str())
                        } else {
                            mime.essence_str().to_owned()
                        };
                        let value = HeaderValue::from_str(&value).map_err(|e| {
                            Error::internal(format!("invalid content-type header: {e}"))
                        })?;

                        let mut res = ctx.response();
                        res.headers_mut().insert(CONTENT_TYPE, value);
                        res.set_status(200);
                        res.write(&data);
                        Ok(())
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
                    Err(e) => Err(Error::internal(e)),
                }
            }
        });
    }

    fn add_route(&self, method: Method, path: &str, handler: impl Handler) {
        let path = join_paths(&self.prefix, path);
        let route = Arc::new(Route::new(
            method.clone(),
            path.clone(),
            handler.into_handler(),
            Arc::clone(&self.config),
        ));

        write(&self.matcher)
            .entry(method)
            .or_default()
            .insert(path.as_str(), Arc::clone(&route))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.push(route);
        routes.sort_by(|a, b| a.path().cmp(b.path()));
    }

    /// The routes registered through this router, sorted by path.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| (r.method().clone(), r.path().to_owned()))
            .collect()
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Routes one request through the matched route's pipeline and produces
    /// the response. Unmatched requests get a plain 404.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let matched = {
            let trees = read(&self.matcher);
            trees.get(&method).and_then(|tree| {
                tree.at(&path).ok().map(|m| {
                    let params: HashMap<String, String> = m
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect();
                    (Arc::clone(m.value), PathParams::new(params))
                })
            })
        };

        match matched {
            Some((route, params)) => route.serve(req, params).await,
            None => plain_error(404, "404 page not found"),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins two path segments into one normalized path: single separators, no
/// trailing slash except for the root.
fn join_paths(base: &str, path: &str) -> String {
    let mut joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    while joined.ends_with('/') && joined.len() > 1 {
        joined.pop();
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths_normalizes() {
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/api", "users"), "/api/users");
        assert_eq!(join_paths("/api/", "/users/"), "/api/users");
        assert_eq!(join_paths("/api/v1", "/users/{id}"), "/api/v1/users/{id}");
    }

    #[test]
    fn routes_are_sorted_by_path() {
        let r = Router::new();
        r.get("/zeta", |_ctx: Context| async { Ok(()) });
        r.get("/alpha", |_ctx: Context| async { Ok(()) });
        r.post("/mid", |_ctx: Context| async { Ok(()) });

        let paths: Vec<String> = r.routes().into_iter().map(|(_, p)| p).collect();
        assert_eq!(paths, ["/alpha", "/mid", "/zeta"]);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn duplicate_method_path_panics() {
        let r = Router::new();
        r.get("/dup", |_ctx: Context| async { Ok(()) });
        r.get("/dup", |_ctx: Context| async { Ok(()) });
    }

    #[test]
    fn group_paths_join_all_ancestor_prefixes() {
        let r = Router::new();
        let api = r.group("/api");
        let v1 = api.group("/v1");
        v1.get("/users", |_ctx: Context| async { Ok(()) });

        let routes = v1.routes();
        assert_eq!(routes[0].1, "/api/v1/users");
    }
}
