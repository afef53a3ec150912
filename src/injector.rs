//! Dependency resolution for middleware factories.
//!
//! Values are registered once at startup, keyed by type, and handed to every
//! middleware factory when a controller's call stacks are built.
//!
//! ```rust
//! use std::sync::Arc;
//! use keel::Injector;
//!
//! struct TokenStore { secret: String }
//!
//! let mut injector = Injector::new();
//! injector.provide(Arc::new(TokenStore { secret: "s3cr3t".into() }));
//!
//! let store: Arc<TokenStore> = injector.get().unwrap();
//! assert_eq!(store.secret, "s3cr3t");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-keyed value resolver.
#[derive(Clone, Default)]
pub struct Injector {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value`, replacing any earlier value of the same type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), value);
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector").field("values", &self.values.len()).finish()
    }
}
