//! Static asset serving from an in-memory index.
//!
//! The directory is walked once when the middleware is built. Compressible files above the
//! threshold get a gzip artifact under `<base>/.cache/`, which is served in place of the original.
//! In development the directory is watched and any change rebuilds the whole index, which is
//! then swapped in atomically: a request sees either the old or the new listing.
//!
//! Lookups use the exact request path. When nothing matches:
//!
//! - with a fallback, its body is served
//! - when the path has a known asset extension, the request ends with an empty body
//! - otherwise the chain continues

mod index;
mod watch;

pub use index::{CACHE_DIR, DEFAULT_THRESHOLD, FileEntry, FileIndex, IndexBuilder};

use crate::application::Settings;
use crate::body::{Body, BodyStream};
use crate::config::Environment;
use crate::context::Context;
use crate::error::PipelineError;
use crate::handler::{Finalize, Flow, Middleware};
use crate::mime_types;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::HeaderValue;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, ETAG};
use notify::RecommendedWatcher;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, trace};

/// Produces a body for paths missing from the index, e.g. a single page application shell.
#[async_trait]
pub trait Fallback: Send + Sync {
    async fn body(&self, path: &str) -> Result<Body, PipelineError>;
}

#[async_trait]
impl<F> Fallback for F
where
    F: Fn(&str) -> Body + Send + Sync,
{
    async fn body(&self, path: &str) -> Result<Body, PipelineError> {
        Ok((self)(path))
    }
}

pub struct StaticOptions {
    threshold: u64,
    watch: Option<bool>,
    fallback: Option<Box<dyn Fallback>>,
}

impl StaticOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compressible files larger than this get a gzip artifact.
    #[must_use]
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Forces directory watching on or off, regardless of the environment.
    #[must_use]
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Watches the directory only in development.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.watch = Some(environment.is_development());
        self
    }

    #[must_use]
    pub fn fallback(mut self, fallback: impl Fallback + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn build(self, base: impl AsRef<Path>) -> io::Result<StaticFiles> {
        let root = std::fs::canonicalize(base)?;
        let builder = IndexBuilder::new(root).threshold(self.threshold);
        let listing = Arc::new(ArcSwap::from_pointee(builder.build()?));

        let mut files =
            StaticFiles { listing, fallback: self.fallback, builder, forced: self.watch.is_some(), watcher: None };
        if self.watch.unwrap_or_else(|| Environment::from_env().is_development()) {
            files.start_watching();
        }
        Ok(files)
    }
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD, watch: None, fallback: None }
    }
}

impl std::fmt::Debug for StaticOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticOptions")
            .field("threshold", &self.threshold)
            .field("watch", &self.watch)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Builds the static middleware for `base` with default options.
pub fn build(base: impl AsRef<Path>, fallback: Option<Box<dyn Fallback>>) -> io::Result<StaticFiles> {
    let options = StaticOptions { fallback, ..StaticOptions::default() };
    options.build(base)
}

pub struct StaticFiles {
    listing: Arc<ArcSwap<FileIndex>>,
    fallback: Option<Box<dyn Fallback>>,
    builder: IndexBuilder,
    // set when watching was chosen explicitly, so the application's environment can't override it
    forced: bool,
    watcher: Option<Mutex<RecommendedWatcher>>,
}

impl StaticFiles {
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    fn start_watching(&mut self) {
        match watch::watch(self.builder.clone(), Arc::clone(&self.listing)) {
            Ok(watcher) => self.watcher = Some(Mutex::new(watcher)),
            Err(e) => error!(cause = %e, "unable to watch static directory, serving a fixed index"),
        }
    }

    /// The current snapshot of the index.
    pub fn index(&self) -> Arc<FileIndex> {
        self.listing.load_full()
    }

    async fn serve(&self, ctx: &mut Context, entry: FileEntry) -> Result<Flow, PipelineError> {
        let stream = BodyStream::file(entry.serve_path()).await?.with_hint(entry.ext.as_str());
        let etag = HeaderValue::from_str(&entry.etag()).map_err(PipelineError::invalid_header)?;

        let response = ctx.response_mut();
        if entry.compressed {
            response.insert_header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            response.headers_mut().remove(CONTENT_LENGTH);
        }
        response.set_mime_type(&entry.ext);
        response.set_body(stream);
        response.set_length(entry.size);
        response.set_last_modified(entry.modified)?;
        response.insert_header(ETAG, etag);

        trace!(path = %entry.path.display(), size = entry.size, compressed = entry.compressed, "serving static file");
        Ok(Flow::Finalize(Finalize::RunDefaultResponder))
    }
}

#[async_trait]
impl Middleware for StaticFiles {
    /// Watches the directory only when the application runs in development.
    fn attach(&mut self, settings: &Settings) {
        if self.forced || settings.env.is_development() == self.is_watching() {
            return;
        }
        if settings.env.is_development() {
            self.start_watching();
        } else {
            debug!(root = %self.builder.root().display(), "production environment, static directory watch stopped");
            self.watcher = None;
        }
    }

    async fn call(&self, ctx: &mut Context) -> Result<Flow, PipelineError> {
        if ctx.body().is_some() {
            return Ok(Flow::Continue);
        }

        let listing = self.listing.load_full();
        if let Some(entry) = listing.get(ctx.path()) {
            return self.serve(ctx, entry.clone()).await;
        }

        if let Some(fallback) = &self.fallback {
            let path = ctx.path().to_owned();
            let body = fallback.body(&path).await?;
            ctx.set_body(body);
            return Ok(Flow::Finalize(Finalize::RunDefaultResponder));
        }

        if ctx.request().ext().is_some_and(|ext| mime_types::lookup(ext).is_some()) {
            trace!(path = ctx.path(), "missing static asset");
            return Ok(Flow::Finalize(Finalize::SkipDefaultResponder));
        }

        Ok(Flow::Continue)
    }
}

impl std::fmt::Debug for StaticFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticFiles")
            .field("files", &self.listing.load().len())
            .field("fallback", &self.fallback.is_some())
            .field("watching", &self.is_watching())
            .finish()
    }
}
