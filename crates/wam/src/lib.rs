//! An ordered middleware pipeline for HTTP services.
//!
//! Every request gets its own [`Context`] and goes through the handlers registered on the
//! [`Application`], one after the other. A handler either lets the chain continue or finalizes
//! the request, choosing how the response is written:
//!
//! - [`Finalize::RunDefaultResponder`] serializes the body assigned to the response
//! - [`Finalize::SkipDefaultResponder`] ends the response with an empty body
//! - [`Finalize::AlreadyFullyHandled`] leaves the response as the handler wrote it
//!
//! Errors and panics halt the chain and are turned into an error response by
//! [`Context::on_error`].
//!
//! Bundled middleware: [`router`] for path routes, [`static_files`] for a directory of assets with
//! precomputed gzip artifacts, and [`compress`] for on the fly gzip.
//!
//! ```no_run
//! use wam::{compress, router, static_files, Application, Server, endpoint_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::builder()
//!         .middleware(static_files::build("public", None)?)
//!         .route(
//!             "/hello/:name",
//!             router::get(endpoint_fn(|ctx| {
//!                 Box::pin(async move {
//!                     let name = ctx.params().get("name").unwrap_or("world").to_owned();
//!                     ctx.set_body(format!("hello {name}"));
//!                     Ok(())
//!                 })
//!             })),
//!         )
//!         .middleware(compress::build(compress::CompressOptions::default()))
//!         .build()?;
//!
//!     Server::builder().application(app).bind("127.0.0.1:8080").build()?.start().await?;
//!     Ok(())
//! }
//! ```

mod application;
mod body;
mod context;
mod dispatch;
mod error;
mod handler;
mod request;
mod respond;
mod response;
mod server;
mod socket;

pub mod compress;
pub mod config;
pub mod mime_types;
pub mod router;
pub mod static_files;
pub mod status;

pub use application::{Application, ApplicationBuilder, ErrorHook, Settings};
pub use body::{Body, BodyStream, RequestBody, ResponseBody};
pub use config::Environment;
pub use context::Context;
pub use dispatch::{Dispatcher, compose};
pub use error::{BoxError, PipelineError};
pub use handler::{Endpoint, Finalize, Flow, FnEndpoint, FnMiddleware, Middleware, endpoint_fn, middleware_fn};
pub use request::{PathParams, Query, Request};
pub use respond::respond;
pub use response::{DateInput, Response};
pub use server::{Server, ServerBuildError, ServerBuilder};
pub use socket::SocketHandle;
