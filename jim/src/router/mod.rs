/// Generates one registration helper per HTTP method, each forwarding to the
/// surrounding type's `add_route`.
macro_rules! method_helpers {
    () => {
        method_helpers!(
            get => "GET",
            post => "POST",
            put => "PUT",
            delete => "DELETE",
            patch => "PATCH",
            head => "HEAD",
            options => "OPTIONS",
        );
    };
    ($($name:ident => $method:literal),* $(,)?) => {
        $(
            #[doc = concat!("Registers a `", $method, "` route.")]
            pub fn $name(
                &mut self,
                pattern: &str,
                handler: impl $crate::handler::Handler + 'static,
            ) -> &mut Self {
                self.add_route($method, pattern, handler)
            }
        )*
    };
}

pub(crate) mod executor;
pub mod factory;
pub mod group;
pub mod table;
pub mod trie;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::handler::{Handler, HandlerError, SharedHandler};
use crate::middleware::{logger, recovery};
use crate::request::Request;
use crate::response::Response;
use crate::router::group::{GroupInfo, RouterGroup};
use crate::router::table::RouteTable;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;

const ROOT_GROUP: usize = 0;

static NOT_FOUND: Lazy<SharedHandler> = Lazy::new(|| Arc::new(NotFound));

/// Terminal step used when no route matches.
struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError> {
        let body = format!("404 NOT FOUND: {}\n", ctx.path());
        ctx.string(404, body);
        Ok(())
    }

    fn name(&self) -> &str {
        "not_found"
    }
}

/// Route registry and request dispatcher.
///
/// An engine is configured through `&mut self` and serves through `&self`, so
/// once it is shared (typically as `Arc<Engine>`) its routes and groups can no
/// longer change.
///
/// The engine itself acts as the root group with an empty prefix: routes and
/// middleware added directly to it apply to every request.
pub struct Engine {
    config: EngineConfig,
    table: RouteTable,
    groups: Vec<GroupInfo>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            table: RouteTable::new(),
            groups: vec![GroupInfo::new(String::new(), None)],
        }
    }

    /// An engine with request logging and panic recovery on the root group.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.use_middleware(logger()).use_middleware(recovery());
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a group whose routes and middleware live under `prefix`.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let index = self.new_group(prefix.to_string(), Some(ROOT_GROUP));
        RouterGroup::new(self, index)
    }

    /// Adds middleware that runs for every request.
    pub fn use_middleware(&mut self, middleware: impl Handler + 'static) -> &mut Self {
        self.groups[ROOT_GROUP].middlewares.push(Arc::new(middleware));
        self
    }

    pub fn add_route(
        &mut self,
        method: &str,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> &mut Self {
        self.register(method, pattern, Arc::new(handler));
        self
    }

    method_helpers!();

    /// Registered `(method, pattern)` pairs.
    pub fn routes(&self) -> Vec<(&str, &str)> {
        self.table.routes()
    }

    fn new_group(&mut self, prefix: String, parent: Option<usize>) -> usize {
        log::debug!("Group '{prefix}' created");
        self.groups.push(GroupInfo::new(prefix, parent));
        self.groups.len() - 1
    }

    fn register(&mut self, method: &str, pattern: &str, handler: SharedHandler) {
        if self.config.log_routes {
            log::info!("Route {method:>4} - {pattern}");
        }
        self.table.add_route(method, pattern, handler);
    }

    /// Middleware of every group whose prefix starts the path, in group
    /// registration order.
    fn middlewares_for(&self, path: &str) -> Vec<SharedHandler> {
        self.groups
            .iter()
            .filter(|group| group.applies_to(path))
            .flat_map(|group| group.middlewares.iter().cloned())
            .collect()
    }

    /// Dispatches one request through its middleware and matched handler.
    ///
    /// A request that matches no route is answered by a single `404` step, without
    /// group middleware. Handler errors and panics never escape: they become a
    /// `500` response unless the chain had already aborted.
    pub async fn serve(&self, request: Request) -> Response {
        let found = self.table.lookup(request.method(), request.path());
        let mut ctx = match found {
            Some(found) => {
                log::trace!(
                    "Request {} {} matched '{}'",
                    request.method(),
                    request.path(),
                    found.pattern
                );
                let mut chain = self.middlewares_for(request.path());
                chain.push(Arc::clone(found.handler));
                let mut ctx = Context::new(request, chain);
                ctx.set_route(found.pattern, found.params);
                ctx
            }
            None => {
                log::debug!("No route for {} {}", request.method(), request.path());
                Context::new(request, vec![Arc::clone(&*NOT_FOUND)])
            }
        };
        executor::execute(&mut ctx, self.config.recover_panics).await;
        ctx.into_response()
    }
}
