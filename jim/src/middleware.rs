//! Middleware shipped with the engine. [`crate::Engine::with_defaults`] installs
//! both on the root group.

use crate::context::Context;
use crate::handler::{Handler, HandlerError};
use crate::router::executor::panic_message;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Logs status, path and duration of every request once the chain returns.
pub struct Logger;

pub fn logger() -> Logger {
    Logger
}

#[async_trait]
impl Handler for Logger {
    async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError> {
        let start = Instant::now();
        let result = ctx.next().await;
        log::info!(
            "Request {} [{}] {} {} in {:?}",
            ctx.id(),
            ctx.response().status(),
            ctx.method(),
            ctx.path(),
            start.elapsed()
        );
        result
    }

    fn name(&self) -> &str {
        "logger"
    }
}

/// Turns a panic in the rest of the chain into a `500` response.
pub struct Recovery;

pub fn recovery() -> Recovery {
    Recovery
}

#[async_trait]
impl Handler for Recovery {
    async fn exec(&self, ctx: &mut Context) -> Result<(), HandlerError> {
        let caught = AssertUnwindSafe(ctx.next()).catch_unwind().await;
        match caught {
            Ok(result) => result,
            Err(payload) => {
                log::error!(
                    "Request {} {} {} panicked: {}",
                    ctx.id(),
                    ctx.method(),
                    ctx.path(),
                    panic_message(&*payload)
                );
                ctx.abort(500, "Internal Server Error");
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "recovery"
    }
}
