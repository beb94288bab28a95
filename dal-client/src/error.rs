//! Client error types.

use crate::config::ConfigError;
use dal_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Broad classes of failure, for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or I/O failure; never retried by the client.
    Transport,
    /// Response could not be interpreted.
    Format,
    /// Server answered and reported an error.
    Response,
    /// Caller misused the API.
    Usage,
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{message}")]
    Server {
        url: String,
        status: u16,
        /// `HTTP code <status>: <reason>`, followed by the server's error
        /// when one could be read.
        message: String,
        dal_error: Option<String>,
    },

    #[error("not logged in")]
    NotLoggedIn,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("'{command}' can't be performed directly (use {instead})")]
    ReservedCommand {
        command: String,
        instead: &'static str,
    },

    #[error("export file {url} not ready after {waited:?}")]
    ExportNotReady { url: String, waited: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Io(_)
            | ClientError::Transport(_)
            | ClientError::Timeout
            | ClientError::ExportNotReady { .. }
            | ClientError::Cancelled => ErrorCategory::Transport,
            ClientError::Protocol(e) if e.is_usage_error() => ErrorCategory::Usage,
            ClientError::Protocol(ProtocolError::Io(_)) => ErrorCategory::Transport,
            ClientError::Protocol(ProtocolError::ServerReported(_)) => ErrorCategory::Response,
            ClientError::Protocol(_) => ErrorCategory::Format,
            ClientError::Server { .. } => ErrorCategory::Response,
            ClientError::NotLoggedIn
            | ClientError::AlreadyLoggedIn
            | ClientError::ReservedCommand { .. }
            | ClientError::Config(_) => ErrorCategory::Usage,
        }
    }

    /// Returns whether this error is a programming mistake by the caller.
    pub fn is_usage_error(&self) -> bool {
        self.category() == ErrorCategory::Usage
    }

    /// HTTP status of a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error text reported by the server, either in a non-2xx response or in
    /// the `Error` element of a successful one.
    pub fn dal_error(&self) -> Option<&str> {
        match self {
            ClientError::Server { dal_error, .. } => dal_error.as_deref(),
            ClientError::Protocol(ProtocolError::ServerReported(msg)) => Some(msg),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
