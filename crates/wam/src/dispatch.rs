//! Sequential execution of an ordered handler list.

use crate::context::Context;
use crate::error::PipelineError;
use crate::handler::{Finalize, Flow, Middleware};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, trace};

/// Composes handlers into one [`Dispatcher`], preserving registration order.
pub fn compose(handlers: Vec<Box<dyn Middleware>>) -> Dispatcher {
    Dispatcher { handlers }
}

/// Drives one request's context through the composed handlers.
///
/// Each handler runs exactly once, in order, until one of them finalizes the request or fails.
/// A handler that panics is treated like one that returned an error.
pub struct Dispatcher {
    handlers: Vec<Box<dyn Middleware>>,
}

impl Dispatcher {
    /// Runs the chain. `Ok` carries the finalize mode for the responder, `Err` the error that
    /// halted the chain.
    pub async fn execute(&self, ctx: &mut Context) -> Result<Finalize, PipelineError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            let flow = AssertUnwindSafe(handler.call(ctx)).catch_unwind().await.map_err(|panic| {
                let message = panic_message(panic.as_ref());
                error!(index, cause = %message, "handler panicked");
                PipelineError::Panicked { message }
            })??;

            if let Flow::Finalize(mode) = flow {
                trace!(index, ?mode, "chain finalized");
                return Ok(mode);
            }
        }

        Ok(Finalize::RunDefaultResponder)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("handlers", &self.handlers.len()).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
