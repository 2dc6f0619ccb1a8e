//! Handler traits admitted into the pipeline.
//!
//! A [`Middleware`] resolves its slot in the chain by returning a [`Flow`]: either continue with
//! the next handler or finalize the request. An [`Endpoint`] never decides about the chain; the
//! route wrapping it continues automatically after it returns.

use crate::application::Settings;
use crate::context::Context;
use crate::error::PipelineError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// What a middleware asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next handler, or the default responder after the last one.
    Continue,
    /// Stop the chain here.
    Finalize(Finalize),
}

/// How a halted chain completes the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalize {
    /// Serialize the response view as usual.
    RunDefaultResponder,
    /// End the response with an empty body, ignoring whatever the view holds.
    SkipDefaultResponder,
    /// The handler ended the response itself; nothing is left to do.
    AlreadyFullyHandled,
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError>;

    /// Called once with the application's settings when the chain is built.
    fn attach(&mut self, _settings: &Settings) {}
}

/// A route target that only produces a response; the chain always continues after it.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, ctx: &mut Context) -> Result<(), PipelineError>;
}

#[async_trait]
impl<T: Middleware + ?Sized> Middleware for Box<T> {
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        (**self).call(ctx).await
    }

    fn attach(&mut self, settings: &Settings) {
        (**self).attach(settings);
    }
}

#[async_trait]
impl<T: Middleware + ?Sized> Middleware for Arc<T> {
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        (**self).call(ctx).await
    }

    // shared handlers keep the configuration they were built with
    fn attach(&mut self, settings: &Settings) {
        if let Some(inner) = Arc::get_mut(self) {
            inner.attach(settings);
        }
    }
}

#[async_trait]
impl<T: Endpoint + ?Sized> Endpoint for Box<T> {
    async fn call(&self, ctx: &mut Context) -> Result<(), PipelineError> {
        (**self).call(ctx).await
    }
}

/// A closure holder implementing [`Middleware`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Wraps a closure returning a boxed future as a [`Middleware`].
///
/// ```no_run
/// use wam::{Flow, middleware_fn};
///
/// let powered_by = middleware_fn(|ctx| {
///     Box::pin(async move {
///         ctx.set("x-powered-by", "wam")?;
///         Ok(Flow::Continue)
///     })
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<Flow, PipelineError>> + Send + Sync,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<Flow, PipelineError>> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        (self.f)(ctx).await
    }
}

/// A closure holder implementing [`Endpoint`].
pub struct FnEndpoint<F> {
    f: F,
}

/// Wraps a closure returning a boxed future as an [`Endpoint`].
pub fn endpoint_fn<F>(f: F) -> FnEndpoint<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), PipelineError>> + Send + Sync,
{
    FnEndpoint { f }
}

#[async_trait]
impl<F> Endpoint for FnEndpoint<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), PipelineError>> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context) -> Result<(), PipelineError> {
        (self.f)(ctx).await
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnMiddleware")
    }
}

impl<F> std::fmt::Debug for FnEndpoint<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnEndpoint")
    }
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, Flow, Middleware, endpoint_fn, middleware_fn};
    use std::sync::Arc;

    fn assert_is_middleware<T: Middleware>(_handler: &T) {
        // no op
    }

    fn assert_is_endpoint<T: Endpoint>(_handler: &T) {
        // no op
    }

    #[test]
    fn assert_closures_are_handlers() {
        let middleware = middleware_fn(|_ctx| Box::pin(async move { Ok(Flow::Continue) }));
        assert_is_middleware(&middleware);

        let shared: Arc<dyn Middleware> = Arc::new(middleware);
        assert_is_middleware(&shared);

        let endpoint = endpoint_fn(|ctx| {
            Box::pin(async move {
                ctx.set_body("hi");
                Ok(())
            })
        });
        assert_is_endpoint(&endpoint);
    }
}
