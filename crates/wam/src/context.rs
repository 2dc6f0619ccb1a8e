//! The per-request aggregate handed to every middleware.

use crate::application::Settings;
use crate::body::{Body, RequestBody, ResponseBody};
use crate::error::PipelineError;
use crate::request::{PathParams, Request};
use crate::respond::escape;
use crate::response::{DateInput, Response};
use crate::socket::SocketHandle;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, ETAG, LAST_MODIFIED, TRANSFER_ENCODING};
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Owns the request and response views of one in-flight request, the user state bag and the
/// parameters captured by the matching route.
///
/// The most used request and response fields are available directly on the context, e.g.
/// `ctx.set_body(..)` is `ctx.response_mut().set_body(..)` and `ctx.path()` is
/// `ctx.request().path()`.
pub struct Context {
    request: Request,
    response: Response,
    state: HashMap<String, serde_json::Value>,
    params: PathParams,
    settings: Arc<Settings>,
}

impl Context {
    pub fn new(request: http::Request<RequestBody>, settings: Arc<Settings>, socket: Option<SocketHandle>) -> Self {
        let response = Response::new(socket.clone(), Arc::clone(&settings.statuses));
        Self {
            request: Request::new(request, socket),
            response,
            state: HashMap::new(),
            params: PathParams::empty(),
            settings,
        }
    }

    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[inline]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Free-form values shared between the middlewares of this request.
    pub fn state(&self) -> &HashMap<String, serde_json::Value> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut HashMap<String, serde_json::Value> {
        &mut self.state
    }

    /// Parameters captured by the last matching route.
    #[inline]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // request shorthands

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn set_method(&mut self, method: Method) {
        self.request.set_method(method);
    }

    pub fn url(&self) -> &str {
        self.request.url()
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), PipelineError> {
        self.request.set_url(url)
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn origin(&self) -> String {
        self.request.origin()
    }

    pub fn href(&self) -> String {
        self.request.href()
    }

    /// Request header by name, `""` when absent.
    pub fn get(&self, name: &str) -> &str {
        self.request.get(name)
    }

    pub fn is(&self, types: &[&str]) -> bool {
        self.request.is(types)
    }

    // response shorthands

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn message(&self) -> &str {
        self.response.message()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.response.set_message(message);
    }

    pub fn body(&self) -> Option<&Body> {
        self.response.body()
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.response.set_body(body);
    }

    pub fn clear_body(&mut self) {
        self.response.clear_body();
    }

    pub fn length(&self) -> Option<u64> {
        self.response.length()
    }

    pub fn set_length(&mut self, length: u64) {
        self.response.set_length(length);
    }

    pub fn mime_type(&self) -> &str {
        self.response.mime_type()
    }

    pub fn set_mime_type(&mut self, value: &str) {
        self.response.set_mime_type(value);
    }

    pub fn set_last_modified(&mut self, value: impl Into<DateInput>) -> Result<(), PipelineError> {
        self.response.set_last_modified(value)
    }

    /// Sets a response header.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), PipelineError> {
        self.response.set(name, value)
    }

    /// Removes a response header.
    pub fn remove(&mut self, name: &str) {
        self.response.remove(name);
    }

    pub fn headers_sent(&self) -> bool {
        self.response.headers_sent()
    }

    pub fn writable(&self) -> bool {
        self.response.writable()
    }

    /// The error path for a failed chain.
    ///
    /// The error is always reported to the application. When the response can still be written,
    /// it is replaced by an HTML status page: 404 for missing files, the error's own status when
    /// the application recognizes it, 500 otherwise.
    pub fn on_error(&mut self, err: PipelineError) {
        self.settings.report(&err, &self.request);

        if self.response.headers_sent() || !self.response.writable() {
            debug!(cause = %err, "response already started, error not written");
            return;
        }

        let headers = self.response.headers_mut();
        for name in [CONTENT_ENCODING, CONTENT_LENGTH, ETAG, LAST_MODIFIED, TRANSFER_ENCODING] {
            headers.remove(name);
        }

        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            err.explicit_status()
                .filter(|status| self.settings.statuses.contains(*status))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };

        self.response.take_body();
        self.response.set_status(status);

        let message = match err.exposed_message() {
            Some(message) => message.to_owned(),
            None => self.response.message().to_owned(),
        };
        let message = if message.is_empty() { status.as_str().to_owned() } else { escape(&message) };

        self.response.set_mime_type("html");
        self.response.set_length(message.len() as u64);
        self.response.end(message);
    }

    /// Ends the response if no one did and hands it to the transport.
    pub fn into_response(mut self) -> http::Response<ResponseBody> {
        if !self.response.finished() {
            self.response.end(());
        }
        self.response.into_http()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use crate::application::Settings;
    use crate::body::RequestBody;
    use crate::error::PipelineError;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context_with(settings: Settings) -> Context {
        let req = http::Request::builder().uri("/users/7?full=1").body(RequestBody::empty()).unwrap();
        Context::new(req, Arc::new(settings), None)
    }

    fn context() -> Context {
        context_with(Settings::default())
    }

    async fn body_string(ctx: Context) -> (StatusCode, String, String) {
        let res = ctx.into_response();
        let status = res.status();
        let content_type = res.headers().get("content-type").map(|v| v.to_str().unwrap().to_owned()).unwrap_or_default();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_shorthands_delegate() {
        let mut ctx = context();
        assert_eq!(ctx.path(), "/users/7");
        assert_eq!(ctx.url(), "/users/7?full=1");
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);

        ctx.set_body("hello");
        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.mime_type(), "text/plain");
        assert_eq!(ctx.length(), Some(5));

        ctx.set("x-powered-by", "wam").unwrap();
        assert_eq!(ctx.response().get("X-Powered-By"), "wam");

        ctx.state_mut().insert("user".into(), serde_json::json!({"id": 7}));
        assert_eq!(ctx.state()["user"]["id"], 7);
    }

    #[tokio::test]
    async fn test_error_defaults_to_500() {
        let mut ctx = context();
        ctx.set_body("partial");
        ctx.set("etag", "\"abc\"").unwrap();
        ctx.on_error(PipelineError::from("boom"));

        assert!(ctx.response().get("etag").is_empty());
        let (status, content_type, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, "text/html; charset=utf-8");
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_error_not_found_file() {
        let mut ctx = context();
        ctx.on_error(io::Error::new(io::ErrorKind::NotFound, "no such file").into());

        let (status, _, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not Found");
    }

    #[tokio::test]
    async fn test_error_keeps_recognized_status_and_message() {
        let mut ctx = context();
        ctx.on_error(PipelineError::status(StatusCode::FORBIDDEN, "members only"));

        let (status, _, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "members only");

        // not in the status table
        let mut ctx = context();
        ctx.on_error(PipelineError::status(StatusCode::IM_A_TEAPOT, ""));
        let (status, _, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_error_message_is_escaped() {
        let mut ctx = context();
        ctx.on_error(PipelineError::status(StatusCode::BAD_REQUEST, "<script>alert(\"x\")</script>"));

        assert_eq!(ctx.length(), Some(49));
        let (status, _, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;");
    }

    #[tokio::test]
    async fn test_error_after_headers_sent_only_reports() {
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reported);
        let settings = Settings {
            error_hook: Some(Arc::new(move |_err: &PipelineError| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..Settings::default()
        };

        let mut ctx = context_with(settings);
        ctx.set_status(StatusCode::OK);
        ctx.response_mut().end(String::from("already out"));
        ctx.on_error(PipelineError::from("late failure"));

        assert_eq!(reported.load(Ordering::SeqCst), 1);
        let (status, _, body) = body_string(ctx).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "already out");
    }

    #[tokio::test]
    async fn test_unfinished_response_ends_empty() {
        let (status, _, body) = body_string(context()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }
}
