//! Trie based HTTP request dispatch.
//!
//! Routes are registered per method as `/`-separated patterns. A pattern segment
//! starting with `:` binds one path component, a trailing segment starting with `*`
//! binds the rest of the path. Middleware is attached to path-prefix groups and
//! runs around the matched handler in onion order:
//!
//! ```text
//!  request ──► group "" middleware ──► group "/v2" middleware ──► handler
//!  response ◄── (after next)      ◄── (after next)           ◄──┘
//! ```
//!
//! ```rust,ignore
//! use jim::{Context, Engine, HandlerError};
//!
//! #[jim::handler]
//! async fn hello(ctx: &mut Context) -> Result<(), HandlerError> {
//!     let name = ctx.param("name").to_string();
//!     ctx.string(200, format!("hello {name}\n"));
//!     Ok(())
//! }
//!
//! let mut engine = Engine::with_defaults();
//! engine.group("/v2").get("/hello/:name", hello());
//! let response = engine.serve(jim::Request::new("GET", "/v2/hello/jim")).await;
//! assert_eq!(response.status(), 200);
//! ```

extern crate self as jim;

pub mod config;
pub mod context;
pub mod handler;
pub mod logger;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;

pub use config::{ConfigError, EngineConfig, LogFormat};
pub use context::Context;
pub use handler::{FnHandler, Handler, HandlerError, HandlerOutput, SharedHandler, handler_fn};
pub use jim_macro::handler;
pub use request::Request;
pub use response::Response;
pub use router::group::RouterGroup;
pub use router::trie::Params;
pub use router::Engine;
