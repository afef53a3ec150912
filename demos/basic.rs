//! Minimal keel example — a users controller, guarded delete, health checks.
//!
//! Run with:
//!   RUST_LOG=info API_BASE=/api PORT=3000 cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/users
//!   curl http://localhost:3000/api/users/42
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/api/users/42                       # 401
//!   curl -X DELETE http://localhost:3000/api/users/42 -H 'authorization: x'  # 204
//!   curl http://localhost:3000/api/healthz

use std::sync::Arc;
use std::time::Duration;

use keel::health::Health;
use keel::middleware::{self, MiddlewareLocation};
use keel::{
    Controller, ControllerRegistry, Exception, FieldFailure, HyperEngine, Injector, Method, Request,
    Response, Server, ServerConfig,
};
use serde::Deserialize;
use serde_json::json;

struct Users;

#[derive(Deserialize)]
struct CreateUser {
    name: String,
}

impl Users {
    // GET /users
    async fn list(self: Arc<Self>, _req: Arc<Request>, res: Response) -> Result<Response, Exception> {
        Ok(res.data(json!([{ "id": 1, "name": "foo" }])))
    }

    // GET /users/:id
    async fn show(self: Arc<Self>, req: Arc<Request>, res: Response) -> Result<Response, Exception> {
        let id = req.param("id").unwrap_or("unknown");
        Ok(res.data(json!({ "id": id, "name": "alice" })))
    }

    // POST /users
    async fn create(self: Arc<Self>, req: Arc<Request>, res: Response) -> Result<Response, Exception> {
        let input: CreateUser = req.json()?;
        if input.name.is_empty() {
            return Err(Exception::validation_failed(vec![FieldFailure::new("name", "must not be empty")]));
        }
        Ok(res
            .status(201)
            .header("location", "/users/99")
            .data(json!({ "id": 99, "name": input.name })))
    }

    // DELETE /users/:id → 204 No Content
    async fn delete(self: Arc<Self>, _req: Arc<Request>, res: Response) -> Result<Response, Exception> {
        Ok(res.status(204))
    }
}

impl Controller for Users {
    fn route_base() -> &'static str { "users" }

    fn configure(registry: &mut ControllerRegistry<Self>) {
        registry
            .register_action_method("list", Method::Get, "", Self::list)
            .register_action_method("show", Method::Get, "/:id", Self::show)
            .register_action_method("create", Method::Post, "", Self::create)
            .register_action_method("delete", Method::Delete, "/:id", Self::delete)
            .before([middleware::log_request()])
            .after([middleware::log_response()])
            .register_middleware(
                MiddlewareLocation::Before,
                [middleware::timeout(Duration::from_secs(2), middleware::require_header("authorization"))],
                Some("delete"),
            );
    }
}

#[tokio::main]
async fn main() -> Result<(), keel::Error> {
    tracing_subscriber::fmt::init();

    let injector = Injector::new();
    let mut server = Server::new(ServerConfig::from_env()?, HyperEngine::new());
    server
        .initialize()?
        .register_controller(Arc::new(Users), &ControllerRegistry::build(), &injector)?
        .register_controller(Arc::new(Health), &ControllerRegistry::build(), &injector)?;

    server.serve().await
}
