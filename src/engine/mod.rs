//! Engine adapters: the seam between keel's normalized model and a concrete
//! HTTP server.
//!
//! An [`Engine`] binds [`RouteDefinition`]s to its own router, adapts every
//! native request into a [`Request`](crate::Request), runs the route's
//! dispatch handler, and writes the resulting [`Response`] back out. Core code
//! never branches on which engine is in use.
//!
//! Route paths arrive in the canonical `:name` syntax. Engines translate them
//! while registering, and must reject what they cannot express right there,
//! never at first request.

pub mod hyper;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::error::Error;
use crate::response::Response;
use crate::route::RouteDefinition;

pub use self::hyper::HyperEngine;

/// A concrete HTTP server that keel can drive.
pub trait Engine: Send + 'static {
    /// The engine's own router/application object.
    type Native;
    /// The engine's network listener handle.
    type Listener;

    /// Constructs the underlying server for `host:port`.
    fn initialize(&mut self, host: &str, port: u16) -> Result<(), Error>;

    /// Binds one route. Fails if the path cannot be expressed by this engine.
    fn register_route_with_engine(&mut self, route: Arc<RouteDefinition>) -> Result<(), Error>;

    /// Resolves once the engine is accepting connections.
    fn start_engine(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Stops accepting connections and waits for in-flight requests.
    fn stop_engine(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Serves files under `webroot`. Engines without static file support
    /// return [`Error::NotImplemented`] when a webroot is given.
    fn register_static_loader(&mut self, webroot: Option<&Path>) -> Result<(), Error>;

    /// `None` until [`initialize`](Engine::initialize) has run.
    fn native(&self) -> Option<&Self::Native>;

    /// `None` until the engine holds a listener.
    fn listener(&self) -> Option<&Self::Listener>;
}

/// Translates a canonical `/users/:id` path into brace syntax (`/users/{id}`).
///
/// Wildcard (`*`) and optional (`?`) segments, literal braces, and `:` that
/// does not start a segment are rejected.
pub fn brace_path(path: &str) -> Result<String, Error> {
    let unsupported = |reason: &str| Error::UnsupportedPath {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };

    if path.contains(['*', '?']) {
        return Err(unsupported("wildcard and optional segments are not supported"));
    }
    if path.contains(['{', '}']) {
        return Err(unsupported("literal braces are not supported"));
    }

    let segments = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some("") => Err(unsupported("parameter name is empty")),
            Some(name) if name.contains(':') => Err(unsupported("one parameter per segment")),
            Some(name) => Ok(format!("{{{name}}}")),
            None if segment.contains(':') => Err(unsupported("parameters must start a segment")),
            None => Ok(segment.to_owned()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(segments.join("/"))
}

/// A response reporting a failure must never look like a success: any status
/// below 400 is forced to 500.
pub fn error_reply(response: Response) -> Response {
    if response.status_code() < 400 {
        response.status(500)
    } else {
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_placeholders() {
        assert_eq!(brace_path("/users/:id").unwrap(), "/users/{id}");
        assert_eq!(brace_path("/a/:x/b/:y").unwrap(), "/a/{x}/b/{y}");
        assert_eq!(brace_path("/static/path").unwrap(), "/static/path");
        assert_eq!(brace_path("/").unwrap(), "/");
    }

    #[test]
    fn rejects_wildcards_and_optionals() {
        for path in ["/files/*", "/files/:rest*", "/users/:id?", "/a/{b}", "/a/:", "/a:b", "/:a:b"] {
            assert!(
                matches!(brace_path(path), Err(Error::UnsupportedPath { .. })),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn error_reply_forces_failure_status() {
        assert_eq!(error_reply(Response::default()).status_code(), 500);
        assert_eq!(error_reply(Response::default().status(302)).status_code(), 500);
        assert_eq!(error_reply(Response::default().status(404)).status_code(), 404);
    }
}
