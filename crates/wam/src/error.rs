//! Error types for the request pipeline.
//!
//! Every failure a handler can hit ends up as a [`PipelineError`]. The dispatcher halts the chain
//! on the first error and hands it to [`Context::on_error`](crate::Context::on_error), which picks
//! the status code and the body shown to the client.

use http::StatusCode;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// A boxed error from foreign code (handlers, transports, body streams).
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An error carrying an explicit status code; its message is safe to show to clients.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("handler error: {source}")]
    Handler { source: BoxError },

    #[error("filesystem error: {source}")]
    Filesystem {
        #[from]
        source: io::Error,
    },

    #[error("compression error: {source}")]
    Compression { source: io::Error },

    #[error("invalid url: {source}")]
    InvalidUrl {
        #[from]
        source: http::uri::InvalidUri,
    },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid date: {value}")]
    InvalidDate { value: String },

    #[error("handler panicked: {message}")]
    Panicked { message: String },
}

impl PipelineError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub fn handler(source: impl Into<BoxError>) -> Self {
        Self::Handler { source: source.into() }
    }

    pub fn compression(source: io::Error) -> Self {
        Self::Compression { source }
    }

    pub fn invalid_header(reason: impl ToString) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    /// Returns true when the error comes from a filesystem lookup of a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Filesystem { source } if source.kind() == io::ErrorKind::NotFound)
    }

    /// The status code the error asks for, if it carries one.
    pub fn explicit_status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message that may be sent to the client as the response body.
    ///
    /// Only errors built with an explicit status expose their message, anything else stays internal.
    pub fn exposed_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// A plain message raised by a handler, wrapped into a proper error value.
#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl From<String> for PipelineError {
    fn from(message: String) -> Self {
        Self::handler(Message(message))
    }
}

impl From<&str> for PipelineError {
    fn from(message: &str) -> Self {
        Self::handler(Message(message.to_owned()))
    }
}
