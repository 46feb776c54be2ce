//! # trellis
//!
//! A minimal Echo-style HTTP framework: routes, groups, middleware, and
//! centralized error rendering. Nothing more. Nothing less.
//!
//! ## The shape of a handler
//!
//! A handler is an `async fn` from a per-request [`Context`] to a
//! `Result<(), Error>`. Write your response through the context; return an
//! error to hand rendering to the error pipeline:
//!
//! ```rust,no_run
//! use trellis::{Context, Error, Router, Server, middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new();
//!     app.wrap(middleware::recover());
//!     app.get("/users/{id}", get_user);
//!
//!     let api = app.group("/api");
//!     api.post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(ctx: Context) -> Result<(), Error> {
//!     let id = ctx.params().int("id").map_err(|e| ctx.error(400, e))?;
//!     ctx.json(200, &serde_json::json!({ "id": id }))
//! }
//!
//! #[derive(serde::Deserialize, serde::Serialize)]
//! struct User { name: String }
//!
//! async fn create_user(ctx: Context) -> Result<(), Error> {
//!     let user: User = ctx.bind()?;
//!     ctx.json(201, &user)
//! }
//! ```
//!
//! ## What the core owns, and what it delegates
//!
//! trellis owns the dispatch pipeline: route matching and grouping,
//! middleware composition, the request context, and translating failures
//! into responses. Path matching is [`matchit`]'s radix tree; the wire is
//! hyper over tokio; TLS, rate limiting, and body-size limits belong to the
//! proxy in front of you.
//!
//! Failures are a tagged union ([`Error`]): either a failure carries the
//! status code it renders as, or it renders as a 500. Per-status error
//! handlers, with a content-negotiating default, turn the failure into the
//! response. They are per router and inherited nowhere: each
//! [`Router::group`] starts with a fresh default.

mod bind;
mod context;
mod error;
mod handler;
mod params;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;
pub mod mime;

pub use bind::{Binder, decode_json, default_binder};
pub use context::Context;
pub use error::{
    BoxError, Error, ErrorHandlerFn, ErrorHandlers, HttpError, ResultExt, default_error_handler,
    error_handler,
};
pub use handler::{BoxFuture, ErasedHandler, Handler, HandlerFn};
pub use middleware::Middleware;
pub use params::{PathParams, ValueParams};
pub use response::Response;
pub use router::Router;
pub use server::Server;
