//! Built-in Kubernetes health-check controller.
//!
//! | Check | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Both paths are placed under the configured API base:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keel::{ControllerRegistry, HyperEngine, Injector, Server, ServerConfig};
//! use keel::health::Health;
//!
//! # fn main() -> Result<(), keel::Error> {
//! let mut server = Server::new(ServerConfig::default(), HyperEngine::new());
//! server
//!     .initialize()?
//!     .register_controller(Arc::new(Health), &ControllerRegistry::<Health>::build(), &Injector::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! Write your own controller instead if readiness must gate on dependency
//! availability (database connections, downstream services, etc.).

use std::sync::Arc;

use crate::controller::{Controller, ControllerRegistry};
use crate::exception::Exception;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Liveness and readiness checks.
pub struct Health;

impl Health {
    /// Always `200 ok`. If the process can respond to HTTP at all, it is alive.
    async fn liveness(self: Arc<Self>, _req: Arc<Request>, _res: Response) -> Result<Response, Exception> {
        Ok(Response::text("ok"))
    }

    async fn readiness(self: Arc<Self>, _req: Arc<Request>, _res: Response) -> Result<Response, Exception> {
        Ok(Response::text("ready"))
    }
}

impl Controller for Health {
    fn configure(registry: &mut ControllerRegistry<Self>) {
        registry
            .register_action_method("liveness", Method::Get, "healthz", Self::liveness)
            .register_action_method("readiness", Method::Get, "readyz", Self::readiness);
    }
}
