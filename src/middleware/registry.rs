//! Per-controller middleware bookkeeping.

use std::collections::HashMap;
use std::fmt;

use super::{MiddlewareFactory, MiddlewareLocation};

/// Ordered `before` and `after` factory lists.
#[derive(Clone, Default)]
pub struct MiddlewareSet {
    pub before: Vec<MiddlewareFactory>,
    pub after: Vec<MiddlewareFactory>,
}

impl MiddlewareSet {
    pub fn at(&self, location: MiddlewareLocation) -> &[MiddlewareFactory] {
        match location {
            MiddlewareLocation::Before => &self.before,
            MiddlewareLocation::After => &self.after,
        }
    }

    fn at_mut(&mut self, location: MiddlewareLocation) -> &mut Vec<MiddlewareFactory> {
        match location {
            MiddlewareLocation::Before => &mut self.before,
            MiddlewareLocation::After => &mut self.after,
        }
    }
}

impl fmt::Debug for MiddlewareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareSet")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

/// Global and per-action middleware declared for one controller type.
///
/// Registration only ever appends. Once the owning registry is frozen behind
/// an `Arc` it is shared, read-only, by every instance and request.
#[derive(Clone, Debug, Default)]
pub struct MiddlewareRegistry {
    all: MiddlewareSet,
    methods: HashMap<String, MiddlewareSet>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `factories` to the global list for `location`, or to the list
    /// of `action` when one is given. Per-action lists are created on first use.
    pub fn register(
        &mut self,
        location: MiddlewareLocation,
        factories: impl IntoIterator<Item = MiddlewareFactory>,
        action: Option<&str>,
    ) {
        let set = match action {
            Some(name) => self.methods.entry(name.to_owned()).or_default(),
            None => &mut self.all,
        };
        set.at_mut(location).extend(factories);
    }

    pub fn global(&self) -> &MiddlewareSet {
        &self.all
    }

    pub fn for_action(&self, action: &str) -> Option<&MiddlewareSet> {
        self.methods.get(action)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::middleware::log_request;

    #[test]
    fn global_and_per_action_lists_append() {
        let mut registry = MiddlewareRegistry::new();
        registry.register(MiddlewareLocation::Before, [log_request()], None);
        registry.register(MiddlewareLocation::Before, [log_request(), log_request()], None);
        registry.register(MiddlewareLocation::After, [log_request()], Some("list"));

        assert_eq!(registry.global().before.len(), 3);
        assert!(registry.global().after.is_empty());

        let list = registry.for_action("list").unwrap();
        assert!(list.before.is_empty());
        assert_eq!(list.after.len(), 1);
        assert!(registry.for_action("delete").is_none());
    }

    #[test]
    fn registration_keeps_factory_order() {
        let first = log_request();
        let second = log_request();
        let mut registry = MiddlewareRegistry::new();
        registry.register(MiddlewareLocation::Before, [Arc::clone(&first)], Some("a"));
        registry.register(MiddlewareLocation::Before, [Arc::clone(&second)], Some("a"));

        let before = registry.for_action("a").unwrap().at(MiddlewareLocation::Before);
        assert!(Arc::ptr_eq(&before[0], &first));
        assert!(Arc::ptr_eq(&before[1], &second));
    }
}
