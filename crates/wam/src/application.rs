//! The application: an ordered handler chain plus the settings shared by every request.

use crate::body::{RequestBody, ResponseBody};
use crate::config::Environment;
use crate::context::Context;
use crate::dispatch::{Dispatcher, compose};
use crate::error::{BoxError, PipelineError};
use crate::handler::Middleware;
use crate::request::Request;
use crate::respond::respond;
use crate::router::{RouteError, RouteTarget};
use crate::socket::SocketHandle;
use crate::status::StatusMessages;
use bytes::Bytes;
use http::StatusCode;
use http_body::Body as HttpBody;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{error, info};

/// Called with every error that halts a chain, after it has been logged.
pub type ErrorHook = Arc<dyn Fn(&PipelineError) + Send + Sync>;

/// Settings shared by every request of an application.
#[derive(Clone)]
pub struct Settings {
    pub env: Environment,
    /// The status messages the application knows; errors asking for another status become 500s.
    pub statuses: Arc<StatusMessages>,
    pub error_hook: Option<ErrorHook>,
}

impl Settings {
    /// Logs a failed request and forwards the error to the hook.
    pub fn report(&self, err: &PipelineError, request: &Request) {
        error!(cause = %err, method = %request.method(), path = request.path(), "request failed");
        if let Some(hook) = &self.error_hook {
            hook(err);
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { env: Environment::from_env(), statuses: Arc::new(StatusMessages::default()), error_hook: None }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("env", &self.env)
            .field("error_hook", &self.error_hook.is_some())
            .finish_non_exhaustive()
    }
}

pub struct Application {
    dispatcher: Dispatcher,
    settings: Arc<Settings>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one request through the chain and the responder.
    ///
    /// Never fails: a failing chain is turned into an error response by
    /// [`Context::on_error`].
    pub async fn handle<B>(&self, request: http::Request<B>, socket: Option<SocketHandle>) -> http::Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let request = request.map(RequestBody::new);
        let mut ctx = Context::new(request, Arc::clone(&self.settings), socket);

        match self.dispatcher.execute(&mut ctx).await {
            Ok(mode) => respond(&mut ctx, mode),
            Err(e) => ctx.on_error(e),
        }

        ctx.into_response()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").field("dispatcher", &self.dispatcher).field("settings", &self.settings).finish()
    }
}

/// Collects handlers in registration order. The chain is fixed once built.
pub struct ApplicationBuilder {
    handlers: Vec<Box<dyn Middleware>>,
    route_error: Option<RouteError>,
    env: Option<Environment>,
    statuses: StatusMessages,
    error_hook: Option<ErrorHook>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self { handlers: vec![], route_error: None, env: None, statuses: StatusMessages::default(), error_hook: None }
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.handlers.push(Box::new(middleware));
        self
    }

    /// Appends a route. An invalid pattern fails [`build`](Self::build).
    pub fn route(mut self, pattern: &str, target: RouteTarget) -> Self {
        match target.compile(pattern) {
            Ok(route) => self.handlers.push(Box::new(route)),
            Err(e) => {
                error!(cause = %e, pattern, "route rejected");
                self.route_error.get_or_insert(e);
            }
        }
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Registers a status code and the message shown for it.
    pub fn status_message(mut self, status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        self.statuses.insert(status, message);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PipelineError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Application, RouteError> {
        if let Some(e) = self.route_error {
            return Err(e);
        }

        let settings = Settings {
            env: self.env.unwrap_or_else(Environment::from_env),
            statuses: Arc::new(self.statuses),
            error_hook: self.error_hook,
        };
        let mut handlers = self.handlers;
        for handler in &mut handlers {
            handler.attach(&settings);
        }
        info!(handlers = handlers.len(), env = %settings.env, "application built");

        Ok(Application { dispatcher: compose(handlers), settings: Arc::new(settings) })
    }
}

impl std::fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("handlers", &self.handlers.len())
            .field("route_error", &self.route_error)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Application;
    use crate::body::RequestBody;
    use crate::config::Environment;
    use crate::handler::{endpoint_fn, middleware_fn};
    use crate::router;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(uri: &str) -> http::Request<RequestBody> {
        http::Request::builder().uri(uri).body(RequestBody::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_routes_fall_through() {
        let app = Application::builder()
            .route(
                "/user/:id",
                router::get(endpoint_fn(|ctx| {
                    Box::pin(async move {
                        let id = ctx.params().get("id").unwrap_or_default().to_owned();
                        ctx.set_body(format!("user {id}"));
                        Ok(())
                    })
                })),
            )
            .route(
                "/user/me",
                router::get(endpoint_fn(|ctx| {
                    Box::pin(async move {
                        ctx.set_body("me");
                        Ok(())
                    })
                })),
            )
            .build()
            .unwrap();

        let response = app.handle(request("/user/me"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "me");
    }

    #[tokio::test]
    async fn test_custom_status_message_and_hook() {
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reported);

        let app = Application::builder()
            .environment(Environment::Production)
            .status_message(StatusCode::IM_A_TEAPOT, "Short and stout")
            .middleware(middleware_fn(|_ctx| {
                Box::pin(async { Err(crate::PipelineError::status(StatusCode::IM_A_TEAPOT, "no coffee")) })
            }))
            .on_error(move |_err| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_eq!(app.settings().env, Environment::Production);

        let response = app.handle(request("/brew"), None).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "no coffee");
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_application_answers_404_page() {
        let app = Application::builder().build().unwrap();
        let response = app.handle(request("/"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("404 - Not Found"));
    }
}
