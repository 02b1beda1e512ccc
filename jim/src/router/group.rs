use crate::handler::{Handler, SharedHandler};
use crate::router::Engine;
use std::sync::Arc;

/// Registration data kept by the engine for every group.
pub(crate) struct GroupInfo {
    pub(crate) prefix: String,
    pub(crate) middlewares: Vec<SharedHandler>,
    pub(crate) parent: Option<usize>,
}

impl GroupInfo {
    pub(crate) fn new(prefix: String, parent: Option<usize>) -> Self {
        Self {
            prefix,
            middlewares: Vec::new(),
            parent,
        }
    }

    /// A group applies to every request path that starts with its prefix.
    pub(crate) fn applies_to(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Registration handle for a path-prefix group.
///
/// Routes added through a group are registered with the group prefix prepended.
/// Middleware added to a group runs for every request whose path starts with the
/// prefix, whether or not a route matches.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    index: usize,
}

impl<'e> RouterGroup<'e> {
    pub(crate) fn new(engine: &'e mut Engine, index: usize) -> Self {
        Self { engine, index }
    }

    fn info(&self) -> &GroupInfo {
        &self.engine.groups[self.index]
    }

    pub fn prefix(&self) -> &str {
        &self.info().prefix
    }

    /// Prefix of the group this one was created from.
    pub fn parent_prefix(&self) -> Option<&str> {
        self.info()
            .parent
            .map(|parent| self.engine.groups[parent].prefix.as_str())
    }

    /// Creates a nested group whose prefix extends this group's prefix.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let prefix = format!("{}{prefix}", self.prefix());
        let index = self.engine.new_group(prefix, Some(self.index));
        RouterGroup::new(self.engine, index)
    }

    pub fn use_middleware(&mut self, middleware: impl Handler + 'static) -> &mut Self {
        self.engine.groups[self.index]
            .middlewares
            .push(Arc::new(middleware));
        self
    }

    pub fn add_route(
        &mut self,
        method: &str,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> &mut Self {
        let pattern = format!("{}{pattern}", self.prefix());
        self.engine.register(method, &pattern, Arc::new(handler));
        self
    }

    method_helpers!();
}
