//! The response view: the body, status and header rules handlers write through.
//!
//! Assigning a body or a status has side effects on the headers, mirroring what a client
//! expects to see for that body:
//!
//! - a text body sets `Content-Type` to html or plain text (unless already set) and the length
//! - a byte body sets `application/octet-stream` and the length
//! - a stream body infers its type from the stream's extension hint
//! - a JSON body drops any `Content-Length` and sets `application/json`
//! - clearing the body strips the content headers and switches to `204 No Content`
//!
//! Assigning a body moves the status to 200 unless a handler chose a status explicitly, and
//! assigning a no-body status drops the body.

use crate::body::{Body, ResponseBody};
use crate::error::PipelineError;
use crate::mime_types;
use crate::socket::SocketHandle;
use crate::status::{self, StatusMessages};
use chrono::{DateTime, Utc};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub struct Response {
    head: http::response::Parts,
    message: Option<String>,
    body: Option<Body>,
    explicit_status: bool,
    headers_sent: bool,
    finished: bool,
    socket: Option<SocketHandle>,
    wire: Option<ResponseBody>,
    messages: Arc<StatusMessages>,
}

impl Response {
    /// A fresh response: status 404, no body, nothing written yet.
    pub fn new(socket: Option<SocketHandle>, messages: Arc<StatusMessages>) -> Self {
        let (mut head, ()) = http::Response::new(()).into_parts();
        head.status = StatusCode::NOT_FOUND;

        Self {
            head,
            message: None,
            body: None,
            explicit_status: false,
            headers_sent: false,
            finished: false,
            socket,
            wire: None,
            messages,
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Sets the status, marking it as explicitly chosen. A no-body status drops the current body.
    pub fn set_status(&mut self, status: StatusCode) {
        self.explicit_status = true;
        self.head.status = status;
        self.message = None;

        if self.body.is_some() && status::is_empty_body(status) {
            self.clear_body();
        }
    }

    /// Whether a handler has set the status, as opposed to it being inferred from the body.
    #[inline]
    pub fn has_explicit_status(&self) -> bool {
        self.explicit_status
    }

    /// The status message: set explicitly, else from the application table, else the reason phrase.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .or_else(|| self.messages.message(self.head.status))
            .or_else(|| self.head.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    #[inline]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        let body = body.into();
        let replaced = self.body.is_some();

        if !self.explicit_status {
            self.head.status = StatusCode::OK;
        }

        let set_type = !self.head.headers.contains_key(CONTENT_TYPE);

        match &body {
            Body::Text(text) => {
                if set_type {
                    // html if the first non-whitespace character opens a tag
                    self.set_mime_type(if text.trim_start().starts_with('<') { "html" } else { "text" });
                }
                self.set_length(text.len() as u64);
            }
            Body::Bytes(bytes) => {
                if set_type {
                    self.set_mime_type("bin");
                }
                self.set_length(bytes.len() as u64);
            }
            Body::Stream(stream) => {
                if replaced {
                    self.head.headers.remove(CONTENT_LENGTH);
                }
                if set_type && let Some(hint) = stream.hint() {
                    self.set_mime_type(hint);
                }
            }
            Body::Json(_) => {
                self.head.headers.remove(CONTENT_LENGTH);
                self.set_mime_type("json");
            }
        }

        self.body = Some(body);
    }

    /// Removes the body, the content headers, and moves to 204 unless the status is already a
    /// no-body one.
    pub fn clear_body(&mut self) {
        self.body = None;

        if !status::is_empty_body(self.head.status) {
            self.set_status(StatusCode::NO_CONTENT);
        }

        self.head.headers.remove(CONTENT_TYPE);
        self.head.headers.remove(CONTENT_LENGTH);
        self.head.headers.remove(TRANSFER_ENCODING);
    }

    /// Swaps the body without touching status or headers.
    pub(crate) fn replace_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    pub(crate) fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// `Content-Length` when present, else the byte length of the body. `None` for streams of
    /// unknown length.
    pub fn length(&self) -> Option<u64> {
        if let Some(length) = self.head.headers.get(CONTENT_LENGTH) {
            return length.to_str().ok().and_then(|value| value.trim().parse().ok());
        }

        match &self.body {
            None => Some(0),
            Some(body) => body.byte_len(),
        }
    }

    pub fn set_length(&mut self, length: u64) {
        self.head.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }

    /// The response media type without parameters, `""` when unset.
    pub fn mime_type(&self) -> &str {
        self.get("content-type").split(';').next().unwrap_or("").trim()
    }

    /// Sets `Content-Type` from an alias, extension or full type, or removes it when the value
    /// doesn't resolve.
    pub fn set_mime_type(&mut self, value: &str) {
        match mime_types::content_type(value).and_then(|value| HeaderValue::from_str(&value).ok()) {
            Some(content_type) => {
                self.head.headers.insert(CONTENT_TYPE, content_type);
            }
            None => {
                self.head.headers.remove(CONTENT_TYPE);
            }
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        let value = self.head.headers.get(LAST_MODIFIED)?.to_str().ok()?;
        DateTime::parse_from_rfc2822(value).ok().map(|date| date.with_timezone(&Utc))
    }

    pub fn set_last_modified(&mut self, value: impl Into<DateInput>) -> Result<(), PipelineError> {
        let date = value.into().resolve()?;
        let formatted = date.format(HTTP_DATE_FORMAT).to_string();
        let value = HeaderValue::from_str(&formatted).map_err(PipelineError::invalid_header)?;
        self.head.headers.insert(LAST_MODIFIED, value);
        Ok(())
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// Returns a header value by case-insensitive name, or `""` when absent.
    pub fn get(&self, name: &str) -> &str {
        self.head.headers.get(name.to_ascii_lowercase().as_str()).and_then(|value| value.to_str().ok()).unwrap_or("")
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), PipelineError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(PipelineError::invalid_header)?;
        let value = HeaderValue::from_str(value).map_err(PipelineError::invalid_header)?;
        self.head.headers.insert(name, value);
        Ok(())
    }

    pub fn set_many<I, K, V>(&mut self, headers: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers.into_iter().try_for_each(|(name, value)| self.set(name.as_ref(), value.as_ref()))
    }

    /// Sets a header from already validated parts.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.head.headers.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.head.headers.remove(name.to_ascii_lowercase().as_str());
    }

    /// Checks the response media type against the candidates.
    pub fn is(&self, types: &[&str]) -> bool {
        mime_types::type_is(self.mime_type(), types)
    }

    #[inline]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// False once the response has ended or the connection went away.
    pub fn writable(&self) -> bool {
        if self.finished {
            return false;
        }
        self.socket.as_ref().is_none_or(SocketHandle::is_writable)
    }

    pub fn socket(&self) -> Option<&SocketHandle> {
        self.socket.as_ref()
    }

    /// Writes the head and the given body, finishing the response. Later calls are ignored.
    pub fn end(&mut self, body: impl Into<ResponseBody>) {
        if self.finished {
            trace!(status = %self.head.status, "response already ended, ignoring body");
            return;
        }

        self.wire = Some(body.into());
        self.headers_sent = true;
        self.finished = true;
    }

    pub(crate) fn into_http(self) -> http::Response<ResponseBody> {
        let mut head = self.head;
        if let Some(message) = self.message
            && let Ok(reason) = hyper::ext::ReasonPhrase::try_from(message)
        {
            head.extensions.insert(reason);
        }
        http::Response::from_parts(head, self.wire.unwrap_or_else(ResponseBody::empty))
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("headers", &self.head.headers)
            .field("body", &self.body)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Accepted inputs for [`Response::set_last_modified`].
#[derive(Debug, Clone)]
pub enum DateInput {
    /// An HTTP date or an RFC 3339 timestamp.
    Text(String),
    /// Milliseconds since the unix epoch.
    Millis(i64),
    Date(DateTime<Utc>),
}

impl DateInput {
    fn resolve(self) -> Result<DateTime<Utc>, PipelineError> {
        match self {
            DateInput::Date(date) => Ok(date),
            DateInput::Millis(millis) => {
                DateTime::from_timestamp_millis(millis).ok_or_else(|| PipelineError::InvalidDate { value: millis.to_string() })
            }
            DateInput::Text(text) => DateTime::parse_from_rfc2822(&text)
                .or_else(|_| DateTime::parse_from_rfc3339(&text))
                .map(|date| date.with_timezone(&Utc))
                .map_err(|_invalid| PipelineError::InvalidDate { value: text }),
        }
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        DateInput::Text(value.to_owned())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        DateInput::Text(value)
    }
}

impl From<i64> for DateInput {
    fn from(value: i64) -> Self {
        DateInput::Millis(value)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(value: DateTime<Utc>) -> Self {
        DateInput::Date(value)
    }
}

impl From<SystemTime> for DateInput {
    fn from(value: SystemTime) -> Self {
        DateInput::Date(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::Response;
    use crate::body::{Body, BodyStream};
    use crate::error::PipelineError;
    use crate::socket::SocketHandle;
    use crate::status::StatusMessages;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use http::StatusCode;
    use std::sync::Arc;

    fn response() -> Response {
        Response::new(None, Arc::new(StatusMessages::default()))
    }

    #[test]
    fn test_initial_state() {
        let res = response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(!res.has_explicit_status());
        assert!(res.body().is_none());
        assert_eq!(res.length(), Some(0));
        assert!(res.writable());
        assert!(!res.headers_sent());
    }

    #[test]
    fn test_text_body_infers_html_or_text() {
        let mut res = response();
        res.set_body("  \n<h1>hi</h1>");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.mime_type(), "text/html");
        assert_eq!(res.get("Content-Type"), "text/html; charset=utf-8");
        assert_eq!(res.length(), Some(14));

        let mut res = response();
        res.set_body("héllo");
        assert_eq!(res.mime_type(), "text/plain");
        assert_eq!(res.length(), Some(6));
    }

    #[test]
    fn test_body_keeps_existing_type() {
        let mut res = response();
        res.set_mime_type("css");
        res.set_body("<not html>");
        assert_eq!(res.mime_type(), "text/css");
    }

    #[test]
    fn test_bytes_and_json_bodies() {
        let mut res = response();
        res.set_body(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(res.mime_type(), "application/octet-stream");
        assert_eq!(res.length(), Some(3));

        // structured bodies always switch to json
        res.set_body(serde_json::json!({"ok": true}));
        assert_eq!(res.mime_type(), "application/json");
        assert_eq!(res.get("content-length"), "");
        assert_eq!(res.length(), Some(11));
    }

    #[test]
    fn test_stream_body_uses_hint_and_drops_stale_length() {
        let mut res = response();
        res.set_body("first");
        res.remove("content-type");
        res.set_body(BodyStream::from_reader(tokio::io::empty()).with_hint("js"));

        assert_eq!(res.mime_type(), "text/javascript");
        assert_eq!(res.get("content-length"), "");
        assert_eq!(res.length(), None);

        let mut res = response();
        res.set_length(10);
        res.set_body(BodyStream::from_reader(tokio::io::empty()));
        assert_eq!(res.length(), Some(10));
    }

    #[test]
    fn test_explicit_status_survives_body() {
        let mut res = response();
        res.set_status(StatusCode::CREATED);
        res.set_body("made");
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(res.has_explicit_status());
    }

    #[test]
    fn test_empty_status_clears_body() {
        let mut res = response();
        res.set_body("gone soon");
        res.set_status(StatusCode::NO_CONTENT);

        assert!(res.body().is_none());
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(res.get("content-type"), "");
        assert_eq!(res.get("content-length"), "");
    }

    #[test]
    fn test_clear_body() {
        let mut res = response();
        res.set_body("text");
        res.set("transfer-encoding", "chunked").unwrap();
        res.clear_body();

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.headers().is_empty());

        let mut res = response();
        res.set_status(StatusCode::NOT_MODIFIED);
        res.clear_body();
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    }

    #[test]
    fn test_message_defaults_to_table() {
        let mut res = response();
        assert_eq!(res.message(), "Not Found");

        res.set_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(res.message(), "I'm a teapot");

        res.set_message("short and stout");
        assert_eq!(res.message(), "short and stout");

        res.set_status(StatusCode::from_u16(550).unwrap());
        assert_eq!(res.message(), "Permission denied");
    }

    #[test]
    fn test_last_modified() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let mut res = response();
        res.set_last_modified("Fri, 01 Mar 2024 12:30:00 GMT").unwrap();
        assert_eq!(res.get("last-modified"), "Fri, 01 Mar 2024 12:30:00 GMT");
        assert_eq!(res.last_modified(), Some(expected));

        res.set_last_modified(expected.timestamp_millis()).unwrap();
        assert_eq!(res.last_modified(), Some(expected));

        res.set_last_modified("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(res.last_modified(), Some(expected));

        let err = res.set_last_modified("yesterday").err().unwrap();
        assert!(matches!(err, PipelineError::InvalidDate { .. }));
    }

    #[test]
    fn test_headers() {
        let mut res = response();
        res.set_many([("X-Request-Id", "abc"), ("Cache-Control", "no-cache")]).unwrap();
        assert_eq!(res.get("x-request-id"), "abc");
        assert_eq!(res.get("CACHE-CONTROL"), "no-cache");

        res.remove("X-Request-Id");
        assert_eq!(res.get("x-request-id"), "");

        assert!(res.set("bad header", "x").is_err());
        assert!(res.set("x-ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_is() {
        let mut res = response();
        res.set_body(serde_json::json!({}));
        assert!(res.is(&["json"]));
        assert!(res.is(&["application/*"]));
        assert!(!res.is(&["html"]));
    }

    #[test]
    fn test_writable_follows_socket_and_end() {
        let socket = SocketHandle::new(false);
        let mut res = Response::new(Some(socket.clone()), Arc::new(StatusMessages::default()));
        assert!(res.writable());

        socket.close();
        assert!(!res.writable());

        let mut res = response();
        res.end(String::from("done"));
        assert!(res.headers_sent());
        assert!(!res.writable());

        // a second end is ignored
        res.end(String::from("again"));
        assert!(res.finished());
    }

    #[test]
    fn test_body_variants_report_json() {
        let mut res = response();
        res.set_body(Body::json(&["a"]).unwrap());
        assert!(res.body().is_some_and(Body::is_json));
    }
}
