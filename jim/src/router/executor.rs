use crate::context::Context;
use crate::handler::HandlerError;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Ways a chain can fail without producing a response of its own.
#[derive(Error, Debug)]
pub(crate) enum ChainFault {
    #[error("Handler returned an error. {source}")]
    Handler {
        #[source]
        source: HandlerError,
    },

    #[error("Handler panicked. {message}")]
    Panic { message: String },
}

impl ChainFault {
    #[inline]
    pub(crate) const fn handler(err: HandlerError) -> Self {
        Self::Handler { source: err }
    }

    #[inline]
    pub(crate) fn panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panic {
            message: panic_message(payload),
        }
    }
}

/// Renders a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

/// Drives a request chain from its first step and converts faults into a 500.
///
/// When `recover_panics` is set a panicking step is contained to this request. A
/// chain that already aborted keeps its own response.
pub(crate) async fn execute(ctx: &mut Context, recover_panics: bool) {
    let outcome = if recover_panics {
        let caught = AssertUnwindSafe(ctx.next()).catch_unwind().await;
        match caught {
            Ok(result) => result.map_err(ChainFault::handler),
            Err(payload) => Err(ChainFault::panic(&*payload)),
        }
    } else {
        ctx.next().await.map_err(ChainFault::handler)
    };

    if let Err(fault) = outcome {
        log::error!(
            "Request {} {} {} failed: {fault}",
            ctx.id(),
            ctx.method(),
            ctx.path()
        );
        if !ctx.is_aborted() {
            ctx.abort(500, INTERNAL_SERVER_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{SharedHandler, handler_fn};
    use crate::request::Request;
    use std::sync::Arc;

    fn run(chain: Vec<SharedHandler>) -> Context {
        Context::new(Request::new("GET", "/boom"), chain)
    }

    #[tokio::test]
    async fn test_error_becomes_internal_server_error() {
        let failing: SharedHandler = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.string(200, "half written");
                Err(HandlerError::failed("database unavailable"))
            })
        }));
        let mut ctx = run(vec![failing]);
        execute(&mut ctx, true).await;

        let response = ctx.into_response();
        assert_eq!(response.status(), 500);
        assert_eq!(response.body_text(), r#"{"message":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let panicking: SharedHandler = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                if ctx.path() == "/boom" {
                    panic!("handler exploded");
                }
                Ok(())
            })
        }));
        let mut ctx = run(vec![panicking]);
        execute(&mut ctx, true).await;
        assert_eq!(ctx.response().status(), 500);
    }

    #[tokio::test]
    #[should_panic(expected = "handler exploded")]
    async fn test_panic_unwinds_without_recovery() {
        let panicking: SharedHandler = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                if ctx.path() == "/boom" {
                    panic!("handler exploded");
                }
                Ok(())
            })
        }));
        let mut ctx = run(vec![panicking]);
        execute(&mut ctx, false).await;
    }

    #[tokio::test]
    async fn test_error_answered_without_recovery() {
        let failing: SharedHandler = Arc::new(handler_fn(|_ctx| {
            Box::pin(async move { Err(HandlerError::failed("still isolated")) })
        }));
        let mut ctx = run(vec![failing]);
        execute(&mut ctx, false).await;
        assert_eq!(ctx.response().status(), 500);
    }

    #[tokio::test]
    async fn test_aborted_response_is_kept() {
        let aborting: SharedHandler = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.abort(418, "teapot");
                Err(HandlerError::failed("after abort"))
            })
        }));
        let mut ctx = run(vec![aborting]);
        execute(&mut ctx, true).await;
        assert_eq!(ctx.response().status(), 418);
        assert_eq!(ctx.response().body_text(), r#"{"message":"teapot"}"#);
    }

    #[tokio::test]
    async fn test_success_leaves_response_alone() {
        let ok: SharedHandler = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.string(202, "accepted");
                Ok(())
            })
        }));
        let mut ctx = run(vec![ok]);
        execute(&mut ctx, false).await;
        assert_eq!(ctx.response().status(), 202);
        assert_eq!(ctx.response().body(), b"accepted");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(&*payload), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
