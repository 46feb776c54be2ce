//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* concrete types in a single
//! matching structure. Rust collections can only hold one concrete type, so
//! handlers are hidden behind a trait object (`dyn ErasedHandler`) and stored
//! uniformly as [`HandlerFn`].
//!
//! Registration goes `handler.into_handler()` (the [`Handler`] blanket impl)
//! to `Arc::new(FnHandler(handler))` stored as `HandlerFn`; request time is
//! one `handler.call(ctx)` vtable dispatch.
//!
//! Middleware operates on [`HandlerFn`] directly: a middleware is a function
//! from one `HandlerFn` to another, so the composed pipeline is itself just
//! another `HandlerFn`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to the handler outcome.
///
/// `Pin<Box<_>>` because the runtime must be able to poll the future in-place;
/// `Send + 'static` so tokio can move it across threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;

/// The object-safe dispatch interface behind [`HandlerFn`].
///
/// Middleware invokes the handler it wraps through this trait:
/// `next.call(ctx).await`. You never implement it yourself; the [`Handler`]
/// blanket impl produces the only implementations.
pub trait ErasedHandler: Send + Sync {
    fn call(&self, ctx: Context) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
///
/// This is the unit middleware wraps: see [`Middleware`](crate::Middleware).
pub type HandlerFn = Arc<dyn ErasedHandler>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> Result<(), Error>
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it, which keeps the API surface stable.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn into_handler(self) -> HandlerFn;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_handler(self) -> HandlerFn {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype holding a concrete handler `F`, bridging the typed world to the
/// trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self.0)(ctx))
    }
}
