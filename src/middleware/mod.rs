//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, timeouts, and
//! authentication-header inspection.
//!
//! Middleware is declared as a [`MiddlewareFactory`]: a function that receives
//! the [`Injector`] once, when a controller's call stacks are built, and
//! returns the [`BoxedHandler`] used for every request. The returned handler
//! is shared by concurrent requests, so any state it keeps must be
//! synchronized by the handler itself.
//!
//! ```rust
//! use std::sync::Arc;
//! use keel::{Exception, Request, Response, handler};
//! use keel::middleware::{self, MiddlewareFactory};
//!
//! fn stamp_version() -> MiddlewareFactory {
//!     middleware::factory(|_injector| {
//!         handler(|_req: Arc<Request>, res: Response| async move {
//!             Ok::<_, Exception>(res.header("x-api-version", "1"))
//!         })
//!     })
//! }
//! ```

mod guard;
mod registry;
mod timeout;
mod trace;

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler, handler};
use crate::injector::Injector;

pub use guard::require_header;
pub use registry::{MiddlewareRegistry, MiddlewareSet};
pub use timeout::timeout;
pub use trace::{log_request, log_response};

/// Where a middleware runs relative to the action handler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MiddlewareLocation {
    Before,
    After,
}

/// Produces a call-stack stage bound to the given dependency resolver.
pub type MiddlewareFactory = Arc<dyn Fn(&Injector) -> BoxedHandler + Send + Sync + 'static>;

pub fn factory<F>(f: F) -> MiddlewareFactory
where
    F: Fn(&Injector) -> BoxedHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A factory that needs no dependencies: every build shares the same stage.
pub fn stateless(h: impl Handler) -> MiddlewareFactory {
    let stage = handler(h);
    Arc::new(move |_: &Injector| Arc::clone(&stage))
}
