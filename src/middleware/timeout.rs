//! Per-stage deadline.
//!
//! The dispatch fold never times out on its own. Wrap a slow stage with
//! [`timeout`] to bound it.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{MiddlewareFactory, factory};
use crate::exception::Exception;
use crate::handler::handler;
use crate::injector::Injector;
use crate::request::Request;
use crate::response::Response;

/// Wraps the stage built by `inner` so it fails with
/// `503 Service Unavailable` if it has not settled within `limit`.
pub fn timeout(limit: Duration, inner: MiddlewareFactory) -> MiddlewareFactory {
    factory(move |injector: &Injector| {
        let stage = inner(injector);
        handler(move |req: Arc<Request>, res: Response| {
            let stage = Arc::clone(&stage);
            async move {
                let path = req.path().to_owned();
                match tokio::time::timeout(limit, stage.call(req, res)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(path = %path, limit = ?limit, "stage timed out");
                        Err(Exception::service_unavailable(format!(
                            "timed out after {} ms",
                            limit.as_millis()
                        ))
                        .into())
                    }
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionKind;
    use crate::method::Method;
    use crate::middleware::stateless;

    fn sleeper(ms: u64) -> MiddlewareFactory {
        stateless(move |_req: Arc<Request>, res: Response| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, Exception>(res.status(204))
        })
    }

    #[tokio::test]
    async fn fast_stage_passes_through() {
        let stage = timeout(Duration::from_secs(5), sleeper(1))(&Injector::new());
        let req = Arc::new(Request::builder(Method::Get, "/").build());
        let res = stage.call(req, Response::default()).await.unwrap();
        assert_eq!(res.status_code(), 204);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stage_becomes_service_unavailable() {
        let stage = timeout(Duration::from_millis(10), sleeper(10_000))(&Injector::new());
        let req = Arc::new(Request::builder(Method::Get, "/slow").build());
        let err = stage.call(req, Response::default()).await.unwrap_err();
        assert_eq!(Exception::from(err).kind(), ExceptionKind::ServiceUnavailable);
    }
}
