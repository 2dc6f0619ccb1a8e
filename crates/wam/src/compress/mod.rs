//! Gzip encoding of response bodies.
//!
//! The middleware compresses the body already assigned to the response, so it belongs after the
//! handlers producing content. Bodies are left alone when:
//!
//! - there is no body, or the status never carries one
//! - the request is `HEAD`
//! - the response type fails the filter
//! - the response is already encoded
//! - the body is smaller than the threshold
//!
//! Buffered bodies are encoded on the blocking pool; stream bodies are encoded as they are sent.

mod encoder;

pub use encoder::gzip;

use crate::body::{Body, BodyStream};
use crate::context::Context;
use crate::error::PipelineError;
use crate::handler::{Flow, Middleware};
use crate::status;
use async_trait::async_trait;
use bytes::Bytes;
use encoder::{EncodedBody, Encoder};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderValue, Method};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

pub const DEFAULT_THRESHOLD: u64 = 1024;

static COMPRESSIBLE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)^text/|^application/(json|javascript|xml)$|\+json$|\+text$|\+xml$")
        .inspect_err(|e| error!(cause = %e, "invalid compressible type pattern"))
        .ok()
});

/// Returns true for media types worth compressing: text, json, javascript and xml flavors.
pub fn is_compressible(mime_type: &str) -> bool {
    COMPRESSIBLE.as_ref().is_some_and(|regex| regex.is_match(mime_type))
}

type TypeFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct CompressOptions {
    filter: TypeFilter,
    threshold: u64,
}

impl CompressOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides from the response media type (without parameters) whether to compress.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Bodies below this many bytes are sent as they are.
    #[must_use]
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { filter: Arc::new(is_compressible), threshold: DEFAULT_THRESHOLD }
    }
}

impl std::fmt::Debug for CompressOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressOptions").field("threshold", &self.threshold).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Compress {
    options: CompressOptions,
}

pub fn build(options: CompressOptions) -> Compress {
    Compress { options }
}

impl Compress {
    fn should_skip(&self, ctx: &Context) -> bool {
        let response = ctx.response();
        response.body().is_none()
            || status::is_empty_body(response.status())
            || ctx.method() == Method::HEAD
            || response.headers().contains_key(CONTENT_ENCODING)
            || !(self.options.filter)(response.mime_type())
    }
}

#[async_trait]
impl Middleware for Compress {
    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        if self.should_skip(ctx) {
            return Ok(Flow::Continue);
        }

        if let Some(Body::Json(value)) = ctx.body() {
            let text = value.to_string();
            ctx.set_body(text);
        }

        // unknown length means a stream, which is worth encoding on the fly
        if ctx.length().is_some_and(|length| length < self.options.threshold) {
            return Ok(Flow::Continue);
        }

        let response = ctx.response_mut();
        response.insert_header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        response.headers_mut().remove(CONTENT_LENGTH);

        let data = match response.take_body() {
            Some(Body::Text(text)) => Bytes::from(text),
            Some(Body::Bytes(bytes)) => bytes,
            Some(Body::Stream(stream)) => {
                let hint = stream.hint().map(str::to_owned);
                let mut encoded = BodyStream::new(EncodedBody::new(stream.into_inner(), Encoder::gzip()));
                if let Some(hint) = hint {
                    encoded = encoded.with_hint(hint);
                }
                response.replace_body(Body::Stream(encoded));
                return Ok(Flow::Continue);
            }
            Some(Body::Json(value)) => Bytes::from(value.to_string()),
            None => return Ok(Flow::Continue),
        };

        let size = data.len();
        let compressed = tokio::task::spawn_blocking(move || gzip(&data))
            .await
            .map_err(|e| PipelineError::compression(std::io::Error::other(e)))?
            .map_err(PipelineError::compression)?;

        if !ctx.writable() {
            debug!(size, "connection closed during compression, result discarded");
            return Ok(Flow::Continue);
        }

        debug!(size, compressed = compressed.len(), "body compressed");
        ctx.response_mut().replace_body(Body::Bytes(compressed));
        Ok(Flow::Continue)
    }
}
