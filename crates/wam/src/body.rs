//! Body types flowing through the pipeline.
//!
//! - [`RequestBody`]: the inbound body handed over by the transport, consumable once
//! - [`Body`]: the value a handler assigns to the response view
//! - [`ResponseBody`]: the serialized wire body given back to the transport

use crate::error::{BoxError, PipelineError};
use bytes::Bytes;
use futures::TryStreamExt;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// The inbound request body, type-erased over whatever the transport produces.
pub struct RequestBody {
    inner: BoxBody<Bytes, BoxError>,
}

impl RequestBody {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: BoxBody::new(body.map_err(Into::into)) }
    }

    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new().map_err(|never| match never {}))
    }

    /// Reads the whole body into memory.
    pub async fn collect_bytes(self) -> Result<Bytes, PipelineError> {
        let collected = self.inner.collect().await.map_err(PipelineError::handler)?;
        Ok(collected.to_bytes())
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody").field("size_hint", &self.inner.size_hint()).finish()
    }
}

impl HttpBody for RequestBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// A streamed response body, with an optional extension hint used to infer its media type.
pub struct BodyStream {
    inner: BoxBody<Bytes, io::Error>,
    hint: Option<String>,
}

impl BodyStream {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = io::Error> + Send + Sync + 'static,
    {
        Self { inner: BoxBody::new(body), hint: None }
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let stream = ReaderStream::new(reader).map_ok(Frame::data);
        Self::new(StreamBody::new(stream))
    }

    /// Opens a file as a body stream, hinting its extension.
    pub async fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let hint = path.extension().and_then(|ext| ext.to_str()).map(str::to_owned);
        Ok(Self { hint, ..Self::from_reader(file) })
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The extension (or alias) the stream claims to carry, e.g. `"css"`.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub(crate) fn into_inner(self) -> BoxBody<Bytes, io::Error> {
        self.inner
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").field("hint", &self.hint).finish_non_exhaustive()
    }
}

/// A response body as seen by handlers.
///
/// The variant decides how the response view infers `Content-Type` and `Content-Length` when the
/// body is assigned; an unset body is represented by `None` on the response.
#[derive(Debug)]
pub enum Body {
    Text(String),
    Bytes(Bytes),
    Stream(BodyStream),
    Json(serde_json::Value),
}

impl Body {
    /// Builds a structured body from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, PipelineError> {
        serde_json::to_value(value).map(Body::Json).map_err(PipelineError::handler)
    }

    /// Number of bytes the body will take on the wire, when it is known up front.
    pub fn byte_len(&self) -> Option<u64> {
        match self {
            Body::Text(text) => Some(text.len() as u64),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Json(value) => Some(value.to_string().len() as u64),
            Body::Stream(_) => None,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<BodyStream> for Body {
    fn from(value: BodyStream) -> Self {
        Body::Stream(value)
    }
}

/// The serialized body handed to the transport: either a fixed buffer or a piped stream.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(BoxBody<Bytes, io::Error>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Once(Some(bytes)) } }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = io::Error> + Send + Sync + 'static,
    {
        Self { inner: Kind::Stream(BoxBody::new(body)) }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").field("size_hint", &self.size_hint()).finish()
    }
}

impl From<Body> for ResponseBody {
    fn from(body: Body) -> Self {
        match body {
            Body::Text(text) => Self::once(Bytes::from(text)),
            Body::Bytes(bytes) => Self::once(bytes),
            Body::Json(value) => Self::once(Bytes::from(value.to_string())),
            Body::Stream(stream) => Self { inner: Kind::Stream(stream.into_inner()) },
        }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let kind = &mut self.get_mut().inner;
        match kind {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) => Pin::new(box_body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}
