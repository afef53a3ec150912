//! Route definitions handed from controllers to the server.

use std::fmt;
use std::sync::Arc;

use crate::call_stack::CallStack;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// One bindable route: verb, canonical path and the composed call stack.
///
/// Paths use the canonical `:name` placeholder syntax; engines translate it
/// when they bind the route.
#[derive(Clone)]
pub struct RouteDefinition {
    action_name: String,
    method: Method,
    path: String,
    call_stack: Arc<CallStack>,
}

impl RouteDefinition {
    pub fn new(method: Method, path: impl Into<String>, call_stack: CallStack) -> Self {
        Self {
            action_name: call_stack.action().to_owned(),
            method,
            path: path.into(),
            call_stack: Arc::new(call_stack),
        }
    }

    pub fn action_name(&self) -> &str { &self.action_name }
    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn call_stack(&self) -> &CallStack { &self.call_stack }

    /// The composed dispatch handler. Never fails: typed and untyped failures
    /// are already mapped onto the returned response.
    pub async fn dispatch(&self, req: Request, seed: Response) -> Response {
        self.call_stack.dispatch(Arc::new(req), seed).await
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("action_name", &self.action_name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("call_stack", &self.call_stack)
            .finish()
    }
}
