//! Path routing.
//!
//! A [`Route`] is an ordinary middleware: it compiles a path pattern and a method constraint, and
//! on a match stores the captured parameters in the context before calling its handler. A path or
//! method mismatch is not an error, the chain simply continues. An endpoint route also continues
//! once its endpoint returns, so later matching routes still run; a route wrapping a middleware can
//! finalize the request to stop there.
//!
//! ```no_run
//! use wam::router;
//! use wam::{endpoint_fn, Application};
//!
//! let show_user = endpoint_fn(|ctx| {
//!     Box::pin(async move {
//!         let id = ctx.params().get("id").unwrap_or_default().to_owned();
//!         ctx.set_body(format!("user {id}"));
//!         Ok(())
//!     })
//! });
//!
//! let app = Application::builder()
//!     .route("/user/:id", router::get(show_user))
//!     .build()?;
//! # Ok::<(), wam::router::RouteError>(())
//! ```

pub mod filter;
mod pattern;

pub use filter::MethodFilter;
pub use pattern::Pattern;

use crate::application::Settings;
use crate::context::Context;
use crate::error::PipelineError;
use crate::handler::{Endpoint, Flow, Middleware};
use async_trait::async_trait;
use http::Method;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: regex::Error },
    #[error("invalid method '{method}'")]
    InvalidMethod { method: String },
}

/// The handler a route delegates to.
pub enum RouteHandler {
    /// An endpoint; the chain continues automatically once it returns.
    Auto(Box<dyn Endpoint>),
    /// A middleware that decides itself whether the chain continues.
    Next(Box<dyn Middleware>),
}

impl RouteHandler {
    pub fn endpoint(endpoint: impl Endpoint + 'static) -> Self {
        RouteHandler::Auto(Box::new(endpoint))
    }

    pub fn middleware(middleware: impl Middleware + 'static) -> Self {
        RouteHandler::Next(Box::new(middleware))
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteHandler::Auto(_) => f.write_str("RouteHandler::Auto"),
            RouteHandler::Next(_) => f.write_str("RouteHandler::Next"),
        }
    }
}

/// A compiled route: pattern, method constraint and target handler.
pub struct Route {
    pattern: Pattern,
    methods: MethodFilter,
    handler: RouteHandler,
}

impl Route {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn methods(&self) -> &MethodFilter {
        &self.methods
    }

    /// Returns true if the route would handle a request with this method and path.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.methods.matches(method) && self.pattern.is_match(path)
    }
}

/// Compiles a route from a pattern, a method constraint and a handler.
pub fn compile_route(
    pattern: &str,
    methods: impl Into<MethodFilter>,
    handler: RouteHandler,
) -> Result<Route, RouteError> {
    Ok(Route { pattern: Pattern::compile(pattern)?, methods: methods.into(), handler })
}

#[async_trait]
impl Middleware for Route {
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        if !self.methods.matches(ctx.method()) {
            return Ok(Flow::Continue);
        }

        let Some(params) = self.pattern.captures(ctx.path()) else {
            return Ok(Flow::Continue);
        };

        trace!(pattern = self.pattern.as_str(), path = ctx.path(), "route matched");
        ctx.set_params(params);

        match &self.handler {
            RouteHandler::Auto(endpoint) => {
                endpoint.call(ctx).await?;
                Ok(Flow::Continue)
            }
            RouteHandler::Next(middleware) => middleware.call(ctx).await,
        }
    }

    fn attach(&mut self, settings: &Settings) {
        if let RouteHandler::Next(middleware) = &mut self.handler {
            middleware.attach(settings);
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods)
            .field("handler", &self.handler)
            .finish()
    }
}

/// A method constraint paired with a handler, waiting for its pattern.
#[derive(Debug)]
pub struct RouteTarget {
    methods: MethodFilter,
    handler: RouteHandler,
}

impl RouteTarget {
    pub fn new(methods: impl Into<MethodFilter>, handler: RouteHandler) -> Self {
        Self { methods: methods.into(), handler }
    }

    pub fn compile(self, pattern: &str) -> Result<Route, RouteError> {
        compile_route(pattern, self.methods, self.handler)
    }
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Routes ", stringify!($upper_case_method), " requests to an endpoint.")]
        pub fn $method<E: Endpoint + 'static>(endpoint: E) -> RouteTarget {
            RouteTarget::new(Method::$upper_case_method, RouteHandler::endpoint(endpoint))
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(patch, PATCH);

/// Routes requests of any method to an endpoint.
pub fn all<E: Endpoint + 'static>(endpoint: E) -> RouteTarget {
    RouteTarget::new(MethodFilter::Any, RouteHandler::endpoint(endpoint))
}

/// Routes to a middleware that resolves the chain itself.
pub fn with_next<M: Middleware + 'static>(methods: impl Into<MethodFilter>, middleware: M) -> RouteTarget {
    RouteTarget::new(methods, RouteHandler::middleware(middleware))
}

#[cfg(test)]
mod tests {
    use super::{MethodFilter, RouteHandler, compile_route, get, with_next};
    use crate::application::Settings;
    use crate::body::RequestBody;
    use crate::context::Context;
    use crate::handler::{Finalize, Flow, Middleware, endpoint_fn, middleware_fn};
    use http::{Method, StatusCode};
    use std::sync::Arc;

    fn context(method: Method, uri: &str) -> Context {
        let req = http::Request::builder().method(method).uri(uri).body(RequestBody::empty()).unwrap();
        Context::new(req, Arc::new(Settings::default()), None)
    }

    fn echo_id() -> RouteHandler {
        RouteHandler::endpoint(endpoint_fn(|ctx| {
            Box::pin(async move {
                let id = ctx.params().get("id").unwrap_or_default().to_owned();
                ctx.set_body(format!("user {id}"));
                Ok(())
            })
        }))
    }

    #[tokio::test]
    async fn test_match_sets_params_and_auto_continues() {
        let route = compile_route("/user/:id", Method::GET, echo_id()).unwrap();
        let mut ctx = context(Method::GET, "/user/42?tab=posts");

        let flow = route.call(&mut ctx).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(ctx.params().get("id"), Some("42"));
        assert_eq!(ctx.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mismatch_continues_untouched() {
        let route = compile_route("/user/:id", Method::GET, echo_id()).unwrap();

        let mut ctx = context(Method::GET, "/user/42/edit");
        assert_eq!(route.call(&mut ctx).await.unwrap(), Flow::Continue);
        assert!(ctx.body().is_none());
        assert!(ctx.params().is_empty());

        let mut ctx = context(Method::POST, "/user/42");
        assert_eq!(route.call(&mut ctx).await.unwrap(), Flow::Continue);
        assert!(ctx.body().is_none());
    }

    #[tokio::test]
    async fn test_method_list_and_any() {
        let route =
            compile_route("/user/:id", MethodFilter::list(["get", "put"]).unwrap(), echo_id()).unwrap();
        assert!(route.matches(&Method::PUT, "/user/1"));
        assert!(!route.matches(&Method::DELETE, "/user/1"));

        let route = compile_route("/files/*", MethodFilter::Any, echo_id()).unwrap();
        let mut ctx = context(Method::DELETE, "/files/a/b/c");
        route.call(&mut ctx).await.unwrap();
        assert!(ctx.params().is_empty());
        assert!(ctx.body().is_some());
    }

    #[tokio::test]
    async fn test_next_handler_resolves_chain() {
        let handler = middleware_fn(|ctx| {
            Box::pin(async move {
                ctx.set_body("handled");
                Ok(Flow::Finalize(Finalize::RunDefaultResponder))
            })
        });
        let route = with_next(Method::GET, handler).compile("/done").unwrap();

        let mut ctx = context(Method::GET, "/done");
        assert_eq!(route.call(&mut ctx).await.unwrap(), Flow::Finalize(Finalize::RunDefaultResponder));
    }

    #[tokio::test]
    async fn test_method_helper() {
        let route = get(endpoint_fn(|ctx| {
            Box::pin(async move {
                ctx.set_body("ok");
                Ok(())
            })
        }))
        .compile("/")
        .unwrap();

        assert!(route.matches(&Method::GET, "/"));
        assert!(!route.matches(&Method::POST, "/"));
    }

    #[test]
    fn test_regex_syntax_is_literal() {
        let route = compile_route("/a{2}", Method::GET, echo_id()).unwrap();
        assert!(route.matches(&Method::GET, "/a{2}"));
        assert!(!route.matches(&Method::GET, "/aa"));
    }
}
