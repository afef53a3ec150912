//! Call-stack composition and the dispatch fold.
//!
//! For an action `A` the stages run in this literal order:
//!
//! ```text
//! global.before… → A.before… → A → A.after… → global.after…
//! ```
//!
//! Each stage receives the response produced by the previous one. The first
//! stage that fails (returns `Err` or panics) ends the fold; the stages after
//! it never run. [`CallStack::dispatch`] is the single place where that
//! failure becomes an HTTP response.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, warn};

use crate::exception::Exception;
use crate::handler::{BoxedHandler, StageResult};
use crate::injector::Injector;
use crate::middleware::{MiddlewareFactory, MiddlewareRegistry};
use crate::request::Request;
use crate::response::Response;

/// Which slot of the composed order a stage came from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StageKind {
    GlobalBefore,
    ActionBefore,
    Action,
    ActionAfter,
    GlobalAfter,
}

/// The ordered stages bound to one action. Never empty: the action handler is
/// always present.
pub struct CallStack {
    action: String,
    stages: Vec<(StageKind, BoxedHandler)>,
}

impl CallStack {
    /// Builds the stack for `action`, invoking every relevant middleware
    /// factory once with `injector`.
    pub fn compose(
        registry: &MiddlewareRegistry,
        action: &str,
        handler: BoxedHandler,
        injector: &Injector,
    ) -> Self {
        let global = registry.global();
        let local = registry.for_action(action);
        let build = |kind: StageKind, factories: &[MiddlewareFactory]| {
            factories.iter().map(move |f| (kind, f(injector))).collect::<Vec<_>>()
        };

        let mut stages = build(StageKind::GlobalBefore, &global.before);
        if let Some(local) = local {
            stages.extend(build(StageKind::ActionBefore, &local.before));
        }
        stages.push((StageKind::Action, handler));
        if let Some(local) = local {
            stages.extend(build(StageKind::ActionAfter, &local.after));
        }
        stages.extend(build(StageKind::GlobalAfter, &global.after));

        Self { action: action.to_owned(), stages }
    }

    pub fn action(&self) -> &str { &self.action }
    pub fn len(&self) -> usize { self.stages.len() }

    pub fn is_empty(&self) -> bool { self.stages.is_empty() }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|(kind, _)| *kind).collect()
    }

    /// Folds `seed` through every stage in order, stopping at the first failure.
    pub async fn run(&self, req: Arc<Request>, seed: Response) -> StageResult {
        let mut response = seed;
        for (_, stage) in &self.stages {
            let call = AssertUnwindSafe(stage.call(Arc::clone(&req), response));
            response = match call.catch_unwind().await {
                Ok(result) => result?,
                Err(panic) => return Err(anyhow::anyhow!(panic_message(panic.as_ref()))),
            };
        }
        Ok(response)
    }

    /// Runs the fold and maps any failure onto `seed` as an error envelope.
    /// Always yields a response.
    pub async fn dispatch(&self, req: Arc<Request>, seed: Response) -> Response {
        let fallback = seed.clone();
        match self.run(Arc::clone(&req), seed).await {
            Ok(response) => response,
            Err(err) => {
                let exception = Exception::from(err);
                let status = exception.status_code();
                if status >= 500 {
                    error!(action = %self.action, path = %req.path(), status, "{exception}");
                } else {
                    warn!(action = %self.action, path = %req.path(), status, "{exception}");
                }
                exception.respond(fallback)
            }
        }
    }
}

impl fmt::Debug for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStack")
            .field("action", &self.action)
            .field("stages", &self.kinds())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "handler panicked".to_owned()
    }
}
