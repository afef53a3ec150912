//! Structured request/response logging stages.

use std::sync::Arc;

use tracing::info;

use super::{MiddlewareFactory, stateless};
use crate::exception::Exception;
use crate::request::Request;
use crate::response::Response;

/// A `before` stage that logs method and path.
pub fn log_request() -> MiddlewareFactory {
    stateless(|req: Arc<Request>, res: Response| async move {
        info!(method = %req.method(), path = %req.path(), "request");
        Ok::<_, Exception>(res)
    })
}

/// An `after` stage that logs the status the action produced.
///
/// Failed requests skip it: the fold stops at the failing stage.
pub fn log_response() -> MiddlewareFactory {
    stateless(|req: Arc<Request>, res: Response| async move {
        info!(method = %req.method(), path = %req.path(), status = res.status_code(), "response");
        Ok::<_, Exception>(res)
    })
}
