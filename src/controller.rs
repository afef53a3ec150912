//! Controllers: explicit action tables and middleware declarations.
//!
//! A controller type describes itself once, in [`Controller::configure`], by
//! filling a [`ControllerRegistry`]. The registry is then shared by every
//! instance of the type; binding an instance produces one
//! [`RouteDefinition`] per action.
//!
//! ```rust
//! use std::sync::Arc;
//! use keel::{Controller, ControllerRegistry, Exception, Method, Request, Response};
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
//!         let _id = req.param("id");
//!         Ok(res.status(204))
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
//!             .register_middleware(MiddlewareLocation::Before, [middleware::require_header("authorization")], Some("delete"));
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::call_stack::CallStack;
use crate::handler::{BoxedHandler, handler};
use crate::injector::Injector;
use crate::method::Method;
use crate::middleware::{MiddlewareFactory, MiddlewareLocation, MiddlewareRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteDefinition;

/// A type whose methods are bound to routes.
pub trait Controller: Send + Sync + Sized + 'static {
    /// Path segment placed between the API base and each action's route.
    fn route_base() -> &'static str {
        "/"
    }

    /// Declares the actions and middleware of this controller type.
    fn configure(registry: &mut ControllerRegistry<Self>);
}

/// Binds an action function to a controller instance, yielding its stage.
type Bind<C> = Arc<dyn Fn(Arc<C>) -> BoxedHandler + Send + Sync + 'static>;

/// One entry of the action table.
pub struct ActionDefinition<C> {
    method: Method,
    route: String,
    bind: Bind<C>,
}

impl<C> ActionDefinition<C> {
    pub fn method(&self) -> Method { self.method }
    pub fn route(&self) -> &str { &self.route }
}

/// Route base, action table and middleware registry of one controller type.
pub struct ControllerRegistry<C> {
    route_base: String,
    actions: Vec<(String, ActionDefinition<C>)>,
    middleware: MiddlewareRegistry,
}

impl<C: Controller> ControllerRegistry<C> {
    /// Runs [`Controller::configure`] for `C` and freezes the result.
    pub fn build() -> Arc<Self> {
        let mut registry = Self::new(C::route_base());
        C::configure(&mut registry);
        Arc::new(registry)
    }

    pub fn new(route_base: impl Into<String>) -> Self {
        Self {
            route_base: route_base.into(),
            actions: Vec::new(),
            middleware: MiddlewareRegistry::new(),
        }
    }

    /// Adds `name` to the action table. Registering the same name again
    /// replaces the earlier entry in place.
    pub fn register_action_method<H, Fut, E>(
        &mut self,
        name: &str,
        method: Method,
        route: &str,
        action: H,
    ) -> &mut Self
    where
        H: Fn(Arc<C>, Arc<Request>, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let action = Arc::new(action);
        let bind: Bind<C> = Arc::new(move |instance: Arc<C>| {
            let action = Arc::clone(&action);
            handler(move |req: Arc<Request>, res: Response| action(Arc::clone(&instance), req, res))
        });
        let definition = ActionDefinition { method, route: route.to_owned(), bind };

        match self.actions.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = definition,
            None => self.actions.push((name.to_owned(), definition)),
        }
        self
    }

    /// Appends middleware for every action, or only for `action` when given.
    pub fn register_middleware(
        &mut self,
        location: MiddlewareLocation,
        factories: impl IntoIterator<Item = MiddlewareFactory>,
        action: Option<&str>,
    ) -> &mut Self {
        self.middleware.register(location, factories, action);
        self
    }

    pub fn before(&mut self, factories: impl IntoIterator<Item = MiddlewareFactory>) -> &mut Self {
        self.register_middleware(MiddlewareLocation::Before, factories, None)
    }

    pub fn after(&mut self, factories: impl IntoIterator<Item = MiddlewareFactory>) -> &mut Self {
        self.register_middleware(MiddlewareLocation::After, factories, None)
    }

    pub fn route_base(&self) -> &str { &self.route_base }
    pub fn middleware(&self) -> &MiddlewareRegistry { &self.middleware }

    pub fn action(&self, name: &str) -> Option<&ActionDefinition<C>> {
        self.actions.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Action names in registration order.
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(n, _)| n.as_str())
    }

    /// Composes one route per action for `instance`. Middleware factories are
    /// invoked here, once per action, with `injector`.
    pub fn routes(&self, instance: &Arc<C>, injector: &Injector, api_base: &str) -> Vec<RouteDefinition> {
        self.actions
            .iter()
            .map(|(name, action)| {
                let stage = (action.bind)(Arc::clone(instance));
                let stack = CallStack::compose(&self.middleware, name, stage, injector);
                let path = route_path(api_base, &self.route_base, &action.route);
                RouteDefinition::new(action.method, path, stack)
            })
            .collect()
    }
}

impl<C> fmt::Debug for ControllerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<_> = self.actions.iter()
            .map(|(n, a)| (n.as_str(), a.method, a.route.as_str()))
            .collect();
        f.debug_struct("ControllerRegistry")
            .field("route_base", &self.route_base)
            .field("actions", &actions)
            .field("middleware", &self.middleware)
            .finish()
    }
}

/// `{api_base}/{route_base}{route}` with repeated slashes collapsed and no
/// trailing slash (except for the root path).
pub(crate) fn route_path(api_base: &str, route_base: &str, route: &str) -> String {
    let joined = format!("{api_base}/{route_base}{route}");
    let mut path = String::with_capacity(joined.len() + 1);
    for c in joined.chars() {
        if c == '/' && path.ends_with('/') {
            continue;
        }
        path.push(c);
    }
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::call_stack::StageKind;
    use crate::exception::Exception;
    use crate::middleware::log_request;

    struct Widgets {
        label: &'static str,
    }

    impl Widgets {
        async fn list(self: Arc<Self>, _req: Arc<Request>, res: Response) -> Result<Response, Exception> {
            Ok(res.data(json!([self.label])))
        }

        async fn show(self: Arc<Self>, req: Arc<Request>, res: Response) -> Result<Response, Exception> {
            Ok(res.data(json!({ "id": req.param("id") })))
        }

        async fn show_v2(self: Arc<Self>, _req: Arc<Request>, res: Response) -> Result<Response, Exception> {
            Ok(res.status(299))
        }
    }

    impl Controller for Widgets {
        fn route_base() -> &'static str { "widgets" }

        fn configure(registry: &mut ControllerRegistry<Self>) {
            registry
                .register_action_method("list", Method::Get, "", Self::list)
                .register_action_method("show", Method::Get, "/:id", Self::show)
                .before([log_request()])
                .register_middleware(MiddlewareLocation::After, [log_request()], Some("show"));
        }
    }

    #[test]
    fn build_runs_configure() {
        let registry = ControllerRegistry::<Widgets>::build();
        assert_eq!(registry.route_base(), "widgets");
        assert_eq!(registry.action_names().collect::<Vec<_>>(), vec!["list", "show"]);
        assert_eq!(registry.action("show").unwrap().route(), "/:id");
        assert_eq!(registry.middleware().global().before.len(), 1);
    }

    #[test]
    fn reregistering_an_action_overwrites_in_place() {
        let mut registry = ControllerRegistry::<Widgets>::new("widgets");
        registry
            .register_action_method("list", Method::Get, "", Widgets::list)
            .register_action_method("show", Method::Get, "/:id", Widgets::show)
            .register_action_method("list", Method::Post, "/all", Widgets::show_v2);

        assert_eq!(registry.action_names().collect::<Vec<_>>(), vec!["list", "show"]);
        let list = registry.action("list").unwrap();
        assert_eq!(list.method(), Method::Post);
        assert_eq!(list.route(), "/all");
    }

    #[tokio::test]
    async fn routes_bind_the_instance_and_compose_stacks() {
        let registry = ControllerRegistry::<Widgets>::build();
        let instance = Arc::new(Widgets { label: "sprocket" });
        let routes = registry.routes(&instance, &Injector::new(), "/api");

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path(), "/api/widgets");
        assert_eq!(routes[1].path(), "/api/widgets/:id");
        assert_eq!(routes[0].call_stack().kinds(), vec![StageKind::GlobalBefore, StageKind::Action]);
        assert_eq!(
            routes[1].call_stack().kinds(),
            vec![StageKind::GlobalBefore, StageKind::Action, StageKind::ActionAfter]
        );

        let req = Request::builder(Method::Get, "/api/widgets").build();
        let res = routes[0].dispatch(req, Response::default()).await;
        assert_eq!(res.body(), &json!(["sprocket"]));
    }

    #[test]
    fn route_paths_are_normalized() {
        assert_eq!(route_path("/api", "users", "/:id"), "/api/users/:id");
        assert_eq!(route_path("/api", "/", ""), "/api");
        assert_eq!(route_path("", "users", ""), "/users");
        assert_eq!(route_path("", "/", ""), "/");
        assert_eq!(route_path("/api/", "/users/", "/:id"), "/api/users/:id");
    }
}
