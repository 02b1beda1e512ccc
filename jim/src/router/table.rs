use crate::handler::{Handler, SharedHandler};
use crate::router::trie::{Node, Params, extract_params, parse_pattern, split_path};
use fnv::FnvHashMap;

/// Result of a successful route lookup.
pub struct RouteMatch<'a> {
    pub pattern: &'a str,
    pub params: Params,
    pub handler: &'a SharedHandler,
}

impl std::fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Method-indexed set of pattern tries plus the handler registered for each route.
#[derive(Default)]
pub struct RouteTable {
    roots: FnvHashMap<String, Node>,
    handlers: FnvHashMap<String, SharedHandler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn route_key(method: &str, pattern: &str) -> String {
        format!("{method}:{pattern}")
    }

    /// Registers `handler` for `method` and `pattern`.
    ///
    /// Registering the same method and pattern again replaces the handler. A
    /// pattern that ends on the same tree node as an earlier one, such as `/a/:y`
    /// after `/a/:x`, replaces that route.
    pub fn add_route(&mut self, method: &str, pattern: &str, handler: SharedHandler) {
        let parts = parse_pattern(pattern);
        let replaced = self
            .roots
            .entry(method.to_string())
            .or_default()
            .insert(pattern, &parts);
        if let Some(previous) = replaced {
            self.handlers.remove(&Self::route_key(method, &previous));
        }
        if self
            .handlers
            .insert(Self::route_key(method, pattern), handler)
            .is_some()
        {
            log::debug!("Handler for {method} {pattern} replaced");
        }
    }

    /// Resolves a method and request path to the registered route.
    ///
    /// Returns `None` when the method has no routes or nothing matches the path.
    pub fn lookup(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let root = self.roots.get(method)?;
        let parts: Vec<&str> = split_path(path).collect();
        let node = root.search(&parts, 0)?;
        let pattern = node.pattern()?;
        let handler = self.handlers.get(&Self::route_key(method, pattern))?;
        Some(RouteMatch {
            pattern,
            params: extract_params(pattern, &parts),
            handler,
        })
    }

    /// Registered `(method, pattern)` pairs, sorted by method then pattern.
    pub fn routes(&self) -> Vec<(&str, &str)> {
        let mut routes: Vec<(&str, &str)> = self
            .handlers
            .keys()
            .filter_map(|key| key.split_once(':'))
            .collect();
        routes.sort_unstable();
        routes
    }

    /// Number of registered method and pattern pairs.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
