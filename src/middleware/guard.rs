//! Header-presence guard.

use std::sync::Arc;

use super::{MiddlewareFactory, stateless};
use crate::exception::Exception;
use crate::request::Request;
use crate::response::Response;

/// A `before` stage that fails with `401 Unauthorized` when `name` is absent.
///
/// Credential checking is left to the application; this only guarantees the
/// header reached the action.
pub fn require_header(name: &'static str) -> MiddlewareFactory {
    stateless(move |req: Arc<Request>, res: Response| async move {
        match req.header(name) {
            Some(_) => Ok(res),
            None => Err(Exception::unauthorized(format!("missing `{name}` header"))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionKind;
    use crate::injector::Injector;
    use crate::method::Method;

    #[tokio::test]
    async fn passes_when_header_present() {
        let stage = require_header("authorization")(&Injector::new());
        let req = Request::builder(Method::Delete, "/").header("Authorization", "Bearer t").build();
        let res = stage.call(Arc::new(req), Response::default().status(202)).await.unwrap();
        assert_eq!(res.status_code(), 202);
    }

    #[tokio::test]
    async fn rejects_when_header_missing() {
        let stage = require_header("authorization")(&Injector::new());
        let req = Request::builder(Method::Delete, "/").build();
        let err = stage.call(Arc::new(req), Response::default()).await.unwrap_err();
        let exception = Exception::from(err);
        assert_eq!(exception.kind(), ExceptionKind::Unauthorized);
    }
}
