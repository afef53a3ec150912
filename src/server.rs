//! The engine-agnostic server and its lifecycle.
//!
//! ```text
//! Uninitialized ─initialize()─▶ Initialized ─register()─▶ RoutesRegistered
//!                                    │                          │
//!                                    └──────────start()─────────┴─▶ Running ─stop()─▶ Stopped
//! ```
//!
//! Routes can only be registered before `start()`. Once running, the route
//! table is shared read-only by every in-flight request.
//!
//! # Graceful shutdown and Kubernetes
//!
//! [`Server::serve`] waits for **SIGTERM** (sent by the Kubernetes control
//! plane) or **SIGINT** (Ctrl-C), then stops accepting connections and lets
//! every in-flight request finish before returning. Set
//! `terminationGracePeriodSeconds` longer than your slowest request.
//!
//! # Timeouts
//!
//! Neither the server nor the dispatch fold imposes a deadline. Compose
//! [`middleware::timeout`](crate::middleware::timeout) around stages that
//! need one.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::controller::{Controller, ControllerRegistry};
use crate::engine::Engine;
use crate::error::Error;
use crate::injector::Injector;
use crate::response::Response;
use crate::route::RouteDefinition;

/// Where a [`Server`] is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ServerState {
    Uninitialized,
    Initialized,
    RoutesRegistered,
    Running,
    Stopped,
}

impl ServerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized    => "uninitialized",
            Self::Initialized      => "initialized",
            Self::RoutesRegistered => "accepting routes",
            Self::Running          => "running",
            Self::Stopped          => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the configuration and route table and drives an [`Engine`].
pub struct Server<E: Engine> {
    config: ServerConfig,
    engine: E,
    routes: Vec<Arc<RouteDefinition>>,
    state: ServerState,
}

impl<E: Engine> fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<E: Engine> Server<E> {
    pub fn new(config: ServerConfig, engine: E) -> Self {
        Self { config, engine, routes: Vec::new(), state: ServerState::Uninitialized }
    }

    /// Constructs the engine for the configured host and port. Calling it a
    /// second time is an error.
    pub fn initialize(&mut self) -> Result<&mut Self, Error> {
        self.expect_state("initialize", &[ServerState::Uninitialized])?;
        self.config.validate()?;
        self.engine.initialize(&self.config.host, self.config.port)?;
        self.state = ServerState::Initialized;
        debug!(host = %self.config.host, port = self.config.port, "engine initialized");
        Ok(self)
    }

    /// Binds `route` with the engine, then appends it to the route table.
    ///
    /// Paths the engine cannot express are rejected here; a rejected route is
    /// not added to the table.
    pub fn register(&mut self, route: RouteDefinition) -> Result<&mut Self, Error> {
        self.expect_state("register routes", &[ServerState::Initialized, ServerState::RoutesRegistered])?;
        let route = Arc::new(route);
        self.engine.register_route_with_engine(Arc::clone(&route))?;
        debug!(
            method = %route.method(),
            path = %route.path(),
            action = %route.action_name(),
            "route registered"
        );
        self.routes.push(route);
        self.state = ServerState::RoutesRegistered;
        Ok(self)
    }

    /// Registers every action of `instance`, composing its call stacks with
    /// `injector` and prefixing paths with the configured API base.
    pub fn register_controller<C: Controller>(
        &mut self,
        instance: Arc<C>,
        registry: &ControllerRegistry<C>,
        injector: &Injector,
    ) -> Result<&mut Self, Error> {
        let routes = registry.routes(&instance, injector, &self.config.api_base);
        let count = routes.len();
        for route in routes {
            self.register(route)?;
        }
        debug!(controller = std::any::type_name::<C>(), routes = count, "controller registered");
        Ok(self)
    }

    pub fn register_static_loader(&mut self, webroot: Option<&Path>) -> Result<&mut Self, Error> {
        self.expect_state("register a static loader", &[ServerState::Initialized, ServerState::RoutesRegistered])?;
        self.engine.register_static_loader(webroot)?;
        Ok(self)
    }

    /// Starts the engine. Resolves once it is accepting connections.
    pub async fn start(&mut self) -> Result<&Self, Error> {
        self.expect_state("start", &[ServerState::Initialized, ServerState::RoutesRegistered])?;
        self.engine.start_engine().await?;
        self.state = ServerState::Running;
        info!(host = %self.host(), routes = self.routes.len(), "server started");
        Ok(self)
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn stop(&mut self) -> Result<(), Error> {
        self.expect_state("stop", &[ServerState::Running])?;
        self.engine.stop_engine().await?;
        self.state = ServerState::Stopped;
        Ok(())
    }

    /// Starts, runs until SIGTERM or Ctrl-C, then shuts down gracefully.
    pub async fn serve(mut self) -> Result<(), Error> {
        self.start().await?;
        shutdown_signal().await;
        info!("shutdown signal received");
        self.stop().await
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> &[Arc<RouteDefinition>] { &self.routes }
    pub fn state(&self) -> ServerState { self.state }
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// `http://{host}:{port}`
    pub fn host(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }

    /// The engine's native object. `None` before [`initialize`](Self::initialize).
    pub fn engine(&self) -> Option<&E::Native> {
        self.engine.native()
    }

    /// The engine's native listener. `None` before [`initialize`](Self::initialize).
    pub fn http_server(&self) -> Option<&E::Listener> {
        self.engine.listener()
    }

    /// The adapter itself, for engine-specific accessors.
    pub fn adapter(&self) -> &E { &self.engine }

    /// The seed response every request's fold starts from.
    pub fn default_response(&self) -> Response {
        Response::default()
    }

    fn expect_state(&self, operation: &'static str, allowed: &[ServerState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::state(operation, self.state.as_str()))
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT**. On Windows only
/// Ctrl-C is available. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
