//! # keel
//!
//! Controllers, ordered middleware and a request-dispatch pipeline that do not
//! care which HTTP server runs underneath.
//!
//! ## The contract
//!
//! Application code declares *what* happens for a route: an action handler,
//! middleware that runs before it, and middleware that runs after it. keel
//! composes those into one call stack per action and hands it to an
//! [`Engine`], which owns sockets, routing syntax and the native
//! request/response types.
//!
//! - Deterministic stage order per action —
//!   `global.before → action.before → action → action.after → global.after`
//! - One error boundary per request — any failure, typed or not, becomes a
//!   `{"message": …}` response with the right status code
//! - Engine-neutral [`Request`] and [`Response`] — stages never see hyper types
//! - A bundled [`HyperEngine`] — radix-tree routing via [`matchit`], HTTP/1.1
//!   and HTTP/2 via hyper, graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keel::{Controller, ControllerRegistry, Exception, HyperEngine, Injector, Method,
//!            Request, Response, Server, ServerConfig};
//! use keel::middleware::{self, MiddlewareLocation};
//! use serde_json::json;
//!
//! struct Users;
//!
//! impl Users {
//!     async fn list(self: Arc<Self>, _req: Arc<Request>, res: Response) -> Result<Response, Exception> {
//!         Ok(res.data(json!([{ "id": 1, "name": "foo" }])))
//!     }
//!
//!     async fn delete(self: Arc<Self>, req: Arc<Request>, res: Response) -> Result<Response, Exception> {
//!         match req.param("id") {
//!             Some("1") => Ok(res.status(204)),
//!             _ => Err(Exception::not_found("no such user")),
//!         }
//!     }
//! }
//!
//! impl Controller for Users {
//!     fn route_base() -> &'static str { "users" }
//!
//!     fn configure(registry: &mut ControllerRegistry<Self>) {
//!         registry
//!             .register_action_method("list", Method::Get, "", Self::list)
//!             .register_action_method("delete", Method::Delete, "/:id", Self::delete)
//!             .register_middleware(
//!                 MiddlewareLocation::Before,
//!                 [middleware::require_header("authorization")],
//!                 Some("delete"),
//!             );
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::Error> {
//!     let mut server = Server::new(ServerConfig::from_env()?, HyperEngine::new());
//!     server
//!         .initialize()?
//!         .register_controller(Arc::new(Users), &ControllerRegistry::build(), &Injector::new())?;
//!     server.serve().await
//! }
//! ```

mod call_stack;
mod config;
mod controller;
mod error;
mod exception;
mod handler;
mod injector;
mod method;
mod request;
mod response;
mod route;
mod server;

pub mod engine;
pub mod health;
pub mod middleware;

pub use call_stack::{CallStack, StageKind};
pub use config::ServerConfig;
pub use controller::{ActionDefinition, Controller, ControllerRegistry};
pub use engine::{Engine, HyperEngine};
pub use error::Error;
pub use exception::{Exception, ExceptionKind, FieldFailure};
pub use handler::{BoxFuture, BoxedHandler, Handler, StageResult, handler};
pub use injector::Injector;
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, Response};
pub use route::RouteDefinition;
pub use server::{Server, ServerState};
