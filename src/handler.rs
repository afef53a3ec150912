//! Handler trait and type erasure.
//!
//! # How call-stack stages are stored
//!
//! A call stack mixes middleware produced by factories with the action
//! handler itself, each a different concrete type. They are stored uniformly
//! as **trait objects** (`dyn ErasedHandler`) behind an `Arc`.
//!
//! ```text
//! async fn auth(req: Arc<Request>, res: Response) -> Result<Response, Exception>
//!        ↓ handler(auth)
//! auth.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(Arc::new(auth)))           ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! stage.call(req, res)  at request time         ← one vtable dispatch
//!        ↓
//! Box::pin(async move { auth(req, res).await.map_err(Into::into) })
//! ```
//!
//! The wrapped function is invoked *inside* the returned future, so a panic
//! in its synchronous prologue surfaces when the future is polled, where the
//! dispatch boundary can catch it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

// ── Internal types ────────────────────────────────────────────────────────────

/// The outcome of one stage: the next response, or a failure that stops the
/// fold. Failures that downcast to [`Exception`](crate::Exception) keep their
/// status code.
pub type StageResult = anyhow::Result<Response>;

/// A heap-allocated, type-erased future that resolves to a [`StageResult`].
///
/// `Send + 'static` let tokio move the future across threads safely.
pub type BoxFuture = Pin<Box<dyn Future<Output = StageResult> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in
/// [`BoxedHandler`], which middleware factories return.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Arc<Request>, res: Response) -> BoxFuture;
}

/// A type-erased stage shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid call-stack stage.
///
/// Automatically satisfied for any function or closure with the shape:
///
/// ```text
/// Fn(Arc<Request>, Response) -> impl Future<Output = Result<Response, E>>
/// where E: Into<anyhow::Error>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, E> private::Sealed for F
where
    F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
}

impl<F, Fut, E> Handler for F
where
    F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(Arc::new(self)))
    }
}

/// Erases `h` into a [`BoxedHandler`]. Middleware factories return this.
pub fn handler(h: impl Handler) -> BoxedHandler {
    h.into_boxed_handler()
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(Arc<F>);

impl<F, Fut, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn call(&self, req: Arc<Request>, res: Response) -> BoxFuture {
        let f = Arc::clone(&self.0);
        Box::pin(async move { f(req, res).await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Exception;
    use crate::method::Method;

    async fn created(_req: Arc<Request>, res: Response) -> Result<Response, Exception> {
        Ok(res.status(201))
    }

    #[tokio::test]
    async fn async_fn_becomes_stage() {
        let stage = handler(created);
        let req = Arc::new(Request::builder(Method::Post, "/").build());
        let res = stage.call(req, Response::default()).await.unwrap();
        assert_eq!(res.status_code(), 201);
    }

    #[tokio::test]
    async fn closure_errors_are_erased() {
        let stage = handler(|_req: Arc<Request>, _res: Response| async {
            Err::<Response, _>(std::io::Error::other("boom"))
        });
        let req = Arc::new(Request::builder(Method::Get, "/").build());
        let err = stage.call(req, Response::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
