use crate::context::Context;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Boxed future returned by closure handlers.
pub type HandlerOutput<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// A handler shared between the route table, groups and in-flight requests.
pub type SharedHandler = Arc<dyn Handler>;

/// One step of a request chain.
///
/// Middleware and terminal handlers implement the same trait. A middleware hands
/// control to the remainder of the chain with [`Context::next`] and resumes once
/// that call returns, so code before the call runs on the way in and code after it
/// runs on the way out. A step that never calls `next` ends the chain.
///
/// Returning `Err` is treated as an unrecoverable fault for the current request:
/// the dispatcher replaces the response with a generic server error unless the
/// chain was already aborted.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapter that lets a closure act as a [`Handler`].
///
/// Built with [`handler_fn`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHandler<F> {
    /// Overrides the name reported in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

/// Wraps a closure returning a boxed future into a [`Handler`].
///
/// ```rust,ignore
/// let hello = jim::handler_fn(|ctx| {
///     Box::pin(async move {
///         ctx.string(200, "hello");
///         Ok(())
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerOutput<'a> + Send + Sync + 'static,
{
    FnHandler {
        name: "handler_fn",
        f,
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerOutput<'a> + Send + Sync,
{
    async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError> {
        (self.f)(ctx).await
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Errors a handler can surface to the dispatcher.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler could not complete the request.
    #[error("Handler failed. {message}")]
    Failed { message: String },

    /// A structured payload could not be serialized.
    #[error("Failed to encode response body.")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

impl HandlerError {
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    #[inline]
    pub const fn encode(err: serde_json::Error) -> Self {
        Self::Encode { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    struct Greeting;

    #[async_trait]
    impl Handler for Greeting {
        async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError> {
            ctx.string(200, "hi");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_struct_handler_writes_response() {
        let mut ctx = Context::new(Request::new("GET", "/"), Vec::new());
        Greeting.exec(&mut ctx).await.unwrap();
        assert_eq!(ctx.response().status(), 200);
        assert_eq!(ctx.response().body(), b"hi");
    }

    #[test]
    fn test_default_name_is_type_name() {
        assert!(Greeting.name().ends_with("Greeting"));
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = handler_fn(|ctx| {
            Box::pin(async move {
                let method = ctx.method().to_string();
                ctx.string(201, method);
                Ok(())
            })
        })
        .named("echo_method");
        assert_eq!(handler.name(), "echo_method");

        let mut ctx = Context::new(Request::new("POST", "/"), Vec::new());
        handler.exec(&mut ctx).await.unwrap();
        assert_eq!(ctx.response().status(), 201);
        assert_eq!(ctx.response().body(), b"POST");
    }

    #[tokio::test]
    async fn test_closure_handler_error() {
        let handler = handler_fn(|_ctx| Box::pin(async move { Err(HandlerError::failed("boom")) }));
        let mut ctx = Context::new(Request::new("GET", "/"), Vec::new());
        let err = handler.exec(&mut ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Handler failed. boom");
    }
}
