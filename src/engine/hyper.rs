//! The bundled engine: hyper connections, tokio sockets, matchit routing.
//!
//! # Routing
//!
//! One radix tree per HTTP method — O(path-length) lookup via [`matchit`].
//! Canonical `:name` paths are translated to matchit's `{name}` syntax when
//! the route is registered, so conflicts and unsupported syntax surface at
//! bootstrap.
//!
//! # Shutdown
//!
//! [`Engine::stop_engine`] stops `accept()` immediately, asks every open
//! connection to finish its current request and close, then waits for all
//! connection tasks to complete.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use matchit::Router as MatchitRouter;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{Engine, brace_path, error_reply};
use crate::error::Error;
use crate::exception::Exception;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteDefinition;

// ── Route table ───────────────────────────────────────────────────────────────

/// The engine's native router: one radix tree per method.
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<Method, MatchitRouter<Arc<RouteDefinition>>>,
    len: usize,
}

impl RouteTable {
    fn insert(&mut self, route: Arc<RouteDefinition>) -> Result<(), Error> {
        let path = brace_path(route.path())?;
        let method = route.method();
        self.routes
            .entry(method)
            .or_default()
            .insert(path.as_str(), route)
            .map_err(|e| Error::InvalidRoute { path, reason: e.to_string() })?;
        self.len += 1;
        Ok(())
    }

    /// Finds the route for `method` + `path` with its parameters in path order.
    pub fn lookup(
        &self,
        method: &http::Method,
        path: &str,
    ) -> Option<(Arc<RouteDefinition>, Vec<(String, String)>)> {
        let method = Method::try_from(method).ok()?;
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
}

// ── Engine ────────────────────────────────────────────────────────────────────

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// [`Engine`] implementation over hyper's HTTP/1.1 + HTTP/2 server.
#[derive(Default)]
pub struct HyperEngine {
    table: Option<Arc<RouteTable>>,
    listener: Option<std::net::TcpListener>,
    local_addr: Option<SocketAddr>,
    running: Option<Running>,
}

impl HyperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bound address. Useful when the configured port was `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Engine for HyperEngine {
    type Native = RouteTable;
    /// The socket address the listener is bound to.
    type Listener = SocketAddr;

    fn initialize(&mut self, host: &str, port: u16) -> Result<(), Error> {
        if self.table.is_some() {
            return Err(Error::Engine("hyper engine is already initialized".into()));
        }
        // Bound here so address conflicts fail at bootstrap rather than at start.
        let listener = std::net::TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        self.local_addr = Some(listener.local_addr()?);
        self.listener = Some(listener);
        self.table = Some(Arc::new(RouteTable::default()));
        Ok(())
    }

    fn register_route_with_engine(&mut self, route: Arc<RouteDefinition>) -> Result<(), Error> {
        let table = self
            .table
            .as_mut()
            .and_then(Arc::get_mut)
            .ok_or_else(|| Error::Engine("routes can only be added before the engine starts".into()))?;
        table.insert(route)
    }

    async fn start_engine(&mut self) -> Result<(), Error> {
        let Some(table) = self.table.as_ref().map(Arc::clone) else {
            return Err(Error::Engine("hyper engine is not initialized".into()));
        };
        let Some(listener) = take_converted(&mut self.listener, |l| TcpListener::from_std(l.try_clone()?))? else {
            return Err(Error::Engine("hyper engine is already started".into()));
        };
        let (shutdown, signal) = watch::channel(false);

        if let Some(addr) = self.local_addr {
            info!(addr = %addr, routes = table.len(), "keel listening");
        }
        let task = tokio::spawn(accept_loop(listener, table, signal));
        self.running = Some(Running { shutdown, task });
        Ok(())
    }

    async fn stop_engine(&mut self) -> Result<(), Error> {
        let Some(Running { shutdown, task }) = self.running.take() else {
            return Ok(());
        };
        // Receivers may already be gone if the accept loop exited on its own.
        let _ = shutdown.send(true);
        task.await.map_err(|e| Error::Engine(format!("accept loop failed: {e}")))?;
        info!("keel stopped");
        Ok(())
    }

    fn register_static_loader(&mut self, webroot: Option<&Path>) -> Result<(), Error> {
        match webroot {
            Some(root) => Err(Error::NotImplemented(format!(
                "static file serving from `{}` is not implemented for the hyper engine",
                root.display()
            ))),
            None => Ok(()),
        }
    }

    fn native(&self) -> Option<&RouteTable> {
        self.table.as_deref()
    }

    fn listener(&self) -> Option<&SocketAddr> {
        self.local_addr.as_ref()
    }
}

/// Converts the value in `slot`, clearing the slot only once conversion succeeds.
fn take_converted<T, U>(
    slot: &mut Option<T>,
    convert: impl FnOnce(&T) -> std::io::Result<U>,
) -> std::io::Result<Option<U>> {
    let Some(value) = slot.as_ref() else {
        return Ok(None);
    };
    let converted = convert(value)?;
    *slot = None;
    Ok(Some(converted))
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, table: Arc<RouteTable>, mut signal: watch::Receiver<bool>) {
    // JoinSet tracks every spawned connection task so we can wait for them
    // all to finish during shutdown.
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            // Check shutdown first so a stop request immediately stops
            // accepting new connections, even if more are queued.
            biased;

            _ = signal.changed() => {
                info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let table = Arc::clone(&table);
                let mut signal = signal.clone();
                // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper IO traits.
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection, not once per connection.
                    let svc = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                        let table = Arc::clone(&table);
                        async move { dispatch(table, req).await }
                    });

                    // `auto::Builder` handles both HTTP/1.1 and HTTP/2.
                    let builder = ConnBuilder::new(TokioExecutor::new());
                    let conn = builder.serve_connection(io, svc);
                    tokio::pin!(conn);

                    let mut draining = false;
                    loop {
                        tokio::select! {
                            res = conn.as_mut() => {
                                if let Err(e) = res {
                                    error!(peer = %remote_addr, "connection error: {e}");
                                }
                                break;
                            }
                            _ = signal.changed(), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                        }
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one reply.
///
/// Infallible: unmatched paths and unreadable bodies become error envelopes,
/// and the route's dispatch handler already maps stage failures.
async fn dispatch<B>(
    table: Arc<RouteTable>,
    req: hyper::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let seed = Response::default();

    let Some((route, params)) = table.lookup(&parts.method, parts.uri.path()) else {
        debug!(method = %parts.method, path = %parts.uri.path(), "no route");
        let reply = Exception::not_found(format!("no route for {} {}", parts.method, parts.uri.path()))
            .respond(seed);
        return Ok(into_native(error_reply(reply)));
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = %parts.uri.path(), "failed to read request body: {e}");
            let reply = Exception::bad_request("unreadable request body").respond(seed);
            return Ok(into_native(error_reply(reply)));
        }
    };

    // Values may carry obs-text bytes, which `HeaderValue::to_str` rejects.
    let headers: Vec<(String, String)> = parts.headers.iter()
        .map(|(k, v)| (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let request = Request::builder(route.method(), parts.uri.path())
        .params(params)
        .headers(headers)
        .body(body)
        .raw(parts)
        .build();

    let response = route.dispatch(request, seed).await;
    Ok(into_native(response))
}

// ── Response adaptation ───────────────────────────────────────────────────────

/// Converts a normalized response into a hyper reply.
///
/// The status is always set explicitly and every header is copied. `null`
/// bodies send nothing; string bodies under a non-JSON content type are sent
/// verbatim; everything else is JSON with `content-type: application/json`
/// unless a content type was already set.
pub fn into_native(response: Response) -> http::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (body, json) = encode_body(&response);

    let mut native = http::Response::new(Full::new(body));
    *native.status_mut() = status;

    let headers = native.headers_mut();
    for (name, value) in response.headers() {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    if json && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    native
}

fn encode_body(response: &Response) -> (Bytes, bool) {
    let raw_text = response
        .header_value("content-type")
        .is_some_and(|ct| !ct.starts_with("application/json"));

    match response.body() {
        Value::Null => (Bytes::new(), false),
        Value::String(s) if raw_text => (Bytes::from(s.clone()), false),
        body => (Bytes::from(serde_json::to_vec(body).unwrap_or_default()), true),
    }
}

/// Reads a hyper reply back into a normalized response.
///
/// JSON bodies are parsed; other non-empty bodies become a string.
pub async fn from_native<B>(native: http::Response<B>) -> Result<Response, Error>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = native.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| Error::Engine(format!("failed to read response body: {e}")))?
        .to_bytes();

    let mut response = Response::default().status(parts.status.as_u16());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            response = response.header(name.as_str(), value);
        }
    }

    let is_json = response
        .header_value("content-type")
        .is_none_or(|ct| ct.starts_with("application/json"));
    let body = if bytes.is_empty() {
        Value::Null
    } else if is_json {
        serde_json::from_slice(&bytes).map_err(|e| Error::Engine(format!("invalid JSON body: {e}")))?
    } else {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    };
    Ok(response.data(body))
}

#[cfg(test)]
mod tests {
    use http_body_util::StreamBody;
    use hyper::body::Frame;
    use serde_json::json;

    use super::*;
    use crate::call_stack::CallStack;
    use crate::handler::handler;
    use crate::injector::Injector;
    use crate::middleware::MiddlewareRegistry;

    fn route(method: Method, path: &str) -> Arc<RouteDefinition> {
        let stack = CallStack::compose(
            &MiddlewareRegistry::new(),
            "test",
            handler(|_req: Arc<Request>, res: Response| async move { Ok::<_, Exception>(res) }),
            &Injector::new(),
        );
        Arc::new(RouteDefinition::new(method, path, stack))
    }

    #[tokio::test]
    async fn round_trip_preserves_status_and_body() {
        let original = Response::default().status(404).data(json!({ "a": 1 }));
        let back = from_native(into_native(original)).await.unwrap();
        assert_eq!(back.status_code(), 404);
        assert_eq!(back.body(), &json!({ "a": 1 }));
        assert_eq!(back.header_value("content-type"), Some("application/json"));
    }

    #[test]
    fn headers_and_status_are_copied() {
        let native = into_native(
            Response::default().status(201).header("location", "/users/1").header("x-bad\n", "v"),
        );
        assert_eq!(native.status(), StatusCode::CREATED);
        assert_eq!(native.headers()["location"], "/users/1");
        assert!(native.headers().get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn text_bodies_are_sent_verbatim() {
        let native = into_native(Response::text("ok"));
        let back = from_native(native).await.unwrap();
        assert_eq!(back.body(), &json!("ok"));
    }

    #[test]
    fn table_translates_and_matches_params_in_order() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Get, "/teams/:team/users/:id")).unwrap();

        let (found, params) = table.lookup(&http::Method::GET, "/teams/7/users/42").unwrap();
        assert_eq!(found.path(), "/teams/:team/users/:id");
        assert_eq!(params, vec![
            ("team".to_owned(), "7".to_owned()),
            ("id".to_owned(), "42".to_owned()),
        ]);
        assert!(table.lookup(&http::Method::POST, "/teams/7/users/42").is_none());
    }

    #[test]
    fn table_rejects_conflicts_and_wildcards() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Get, "/users/:id")).unwrap();
        assert!(matches!(
            table.insert(route(Method::Get, "/users/:id")),
            Err(Error::InvalidRoute { .. })
        ));
        assert!(matches!(
            table.insert(route(Method::Get, "/files/*")),
            Err(Error::UnsupportedPath { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    fn echo_authorization(method: Method, path: &str) -> Arc<RouteDefinition> {
        let stack = CallStack::compose(
            &MiddlewareRegistry::new(),
            "echo",
            handler(|req: Arc<Request>, res: Response| async move {
                Ok::<_, Exception>(res.data(json!(req.header("authorization"))))
            }),
            &Injector::new(),
        );
        Arc::new(RouteDefinition::new(method, path, stack))
    }

    #[tokio::test]
    async fn unreadable_body_is_bad_request() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Post, "/upload")).unwrap();

        let frames = futures_util::stream::iter(vec![
            Err::<Frame<Bytes>, _>(std::io::Error::other("connection reset")),
        ]);
        let req = hyper::Request::builder()
            .method(http::Method::POST)
            .uri("/upload")
            .body(StreamBody::new(frames))
            .unwrap();

        let reply = from_native(dispatch(Arc::new(table), req).await.unwrap()).await.unwrap();
        assert_eq!(reply.status_code(), 400);
        assert_eq!(reply.body(), &json!({ "message": "unreadable request body" }));
    }

    #[tokio::test]
    async fn non_ascii_header_values_reach_the_request() {
        let mut table = RouteTable::default();
        table.insert(echo_authorization(Method::Get, "/me")).unwrap();
        let table = Arc::new(table);

        let req = hyper::Request::builder()
            .uri("/me")
            .header("authorization", HeaderValue::from_bytes(b"Bearer caf\xc3\xa9").unwrap())
            .body(Full::new(Bytes::new()))
            .unwrap();
        let reply = from_native(dispatch(Arc::clone(&table), req).await.unwrap()).await.unwrap();
        assert_eq!(reply.body(), &json!("Bearer café"));

        // Bytes that are not UTF-8 are replaced, not dropped.
        let req = hyper::Request::builder()
            .uri("/me")
            .header("authorization", HeaderValue::from_bytes(b"Bearer \xe9").unwrap())
            .body(Full::new(Bytes::new()))
            .unwrap();
        let reply = from_native(dispatch(table, req).await.unwrap()).await.unwrap();
        assert_eq!(reply.body(), &json!("Bearer \u{fffd}"));
    }

    #[test]
    fn failed_conversion_leaves_the_slot_filled() {
        let mut slot = Some(7_u8);
        let failed = take_converted(&mut slot, |_| Err::<u8, _>(std::io::Error::other("no reactor")));
        assert!(failed.is_err());
        assert_eq!(slot, Some(7));

        let taken = take_converted(&mut slot, |v| Ok(u16::from(*v))).unwrap();
        assert_eq!(taken, Some(7));
        assert_eq!(slot, None);
        assert!(take_converted(&mut slot, |v| Ok(*v)).unwrap().is_none());
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_losing_the_first() {
        let mut engine = HyperEngine::new();
        engine.initialize("127.0.0.1", 0).unwrap();
        engine.start_engine().await.unwrap();
        assert!(matches!(engine.start_engine().await, Err(Error::Engine(_))));
        assert!(engine.running.is_some());
        engine.stop_engine().await.unwrap();
    }

    #[test]
    fn static_loader_is_not_implemented() {
        let mut engine = HyperEngine::new();
        assert!(engine.register_static_loader(None).is_ok());
        assert!(matches!(
            engine.register_static_loader(Some(Path::new("/srv/www"))),
            Err(Error::NotImplemented(_))
        ));
    }
}
