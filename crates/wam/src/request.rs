//! The request view: computed fields over the inbound message.
//!
//! [`Request`] owns the transport's request head and body. Fields such as `path`, `querystring`
//! and `host` are derived on each call; only the parsed query is cached, and every setter that
//! rewrites the url drops that cache.

use crate::body::RequestBody;
use crate::error::PipelineError;
use crate::mime_types;
use crate::socket::SocketHandle;
use http::uri::PathAndQuery;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

pub struct Request {
    head: http::request::Parts,
    body: Option<RequestBody>,
    socket: Option<SocketHandle>,
    query: OnceLock<Query>,
}

impl Request {
    pub fn new(request: http::Request<RequestBody>, socket: Option<SocketHandle>) -> Self {
        let (head, body) = request.into_parts();
        Self { head, body: Some(body), socket, query: OnceLock::new() }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.head.method = method;
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// The request target as sent on the request line, e.g. `/users?page=2`.
    pub fn url(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", PathAndQuery::as_str)
    }

    /// Replaces path and query, keeping scheme and authority of an absolute-form target.
    pub fn set_url(&mut self, url: &str) -> Result<(), PipelineError> {
        let path_and_query: PathAndQuery = url.parse()?;

        let mut parts = self.head.uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        self.head.uri = Uri::from_parts(parts).map_err(PipelineError::handler)?;
        self.query = OnceLock::new();
        Ok(())
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Rewrites the path, retaining the query string when present.
    pub fn set_path(&mut self, path: &str) -> Result<(), PipelineError> {
        if self.path() == path {
            return Ok(());
        }

        let url = match self.head.uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        };
        self.set_url(&url)
    }

    /// The raw query string without the leading `?`, empty when absent.
    pub fn querystring(&self) -> &str {
        self.head.uri.query().unwrap_or("")
    }

    pub fn set_querystring(&mut self, querystring: &str) -> Result<(), PipelineError> {
        let querystring = querystring.trim_start_matches('?');
        if self.querystring() == querystring {
            return Ok(());
        }

        let url = if querystring.is_empty() {
            self.path().to_owned()
        } else {
            format!("{}?{querystring}", self.path())
        };
        self.set_url(&url)
    }

    /// Same as [`querystring`](Self::querystring) but with the leading `?`.
    pub fn search(&self) -> String {
        let querystring = self.querystring();
        if querystring.is_empty() { String::new() } else { format!("?{querystring}") }
    }

    pub fn set_search(&mut self, search: &str) -> Result<(), PipelineError> {
        self.set_querystring(search)
    }

    /// The parsed query, computed on first access and reused until the url changes.
    pub fn query(&self) -> &Query {
        self.query.get_or_init(|| Query::parse(self.querystring()))
    }

    pub fn set_query(&mut self, query: &Query) -> Result<(), PipelineError> {
        let querystring = serde_urlencoded::to_string(&query.pairs).map_err(PipelineError::handler)?;
        self.set_querystring(&querystring)
    }

    /// Deserializes the query string into `T`; a malformed query answers 400.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_urlencoded::from_str(self.querystring())
            .map_err(|e| PipelineError::status(StatusCode::BAD_REQUEST, format!("invalid query string: {e}")))
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
    ///
    /// `Referer` and `Referrer` are interchangeable.
    pub fn get(&self, name: &str) -> &str {
        let name = name.to_ascii_lowercase();
        if name == "referer" || name == "referrer" {
            let referrer = self.header_str("referrer");
            return if referrer.is_empty() { self.header_str("referer") } else { referrer };
        }
        self.header_str(&name)
    }

    fn header_str(&self, name: &str) -> &str {
        self.head.headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or("")
    }

    /// The declared `Content-Length`, 0 when absent or malformed.
    pub fn length(&self) -> u64 {
        self.get("content-length").trim().parse().unwrap_or(0)
    }

    /// The request media type without parameters such as `charset`.
    pub fn mime_type(&self) -> &str {
        self.get("content-type").split(';').next().unwrap_or("").trim()
    }

    pub fn protocol(&self) -> &'static str {
        if self.socket.as_ref().is_some_and(SocketHandle::encrypted) { "https" } else { "http" }
    }

    #[inline]
    pub fn secure(&self) -> bool {
        self.protocol() == "https"
    }

    /// `hostname[:port]` taken from the first `Host` entry, falling back to the url authority.
    pub fn host(&self) -> &str {
        let host = self.get("host").split(',').next().unwrap_or("").trim();
        if host.is_empty() { self.head.uri.authority().map_or("", |authority| authority.as_str()) } else { host }
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol(), self.host())
    }

    /// The full request url, e.g. `http://example.com/foo?bar=1`.
    pub fn href(&self) -> String {
        if self.head.uri.scheme().is_some() { self.head.uri.to_string() } else { format!("{}{}", self.origin(), self.url()) }
    }

    /// The extension of the last path segment, without the dot.
    pub fn ext(&self) -> Option<&str> {
        let file_name = self.path().rsplit('/').next()?;
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// The first media type the client accepts, `""` when no `Accept` header was sent.
    pub fn accepts(&self) -> &str {
        self.get("accept").split(',').next().unwrap_or("").trim()
    }

    /// Checks the preferred accepted media type against the candidates.
    pub fn is(&self, types: &[&str]) -> bool {
        mime_types::type_is(self.accepts(), types)
    }

    pub fn socket(&self) -> Option<&SocketHandle> {
        self.socket.as_ref()
    }

    /// Takes the inbound body; later calls return `None`.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("method", &self.head.method).field("uri", &self.head.uri).finish_non_exhaustive()
    }
}

/// A parsed query string, keeping every pair in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn parse(querystring: &str) -> Self {
        let pairs = serde_urlencoded::from_str(querystring).unwrap_or_default();
        Self { pairs }
    }

    /// The first value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Path parameters are named segments in the URL path that can be extracted and accessed
/// by name. For example, in the path "/users/:id", "id" is a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
