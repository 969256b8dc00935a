//! Client error types.

use thiserror::Error;

/// Coarse error category. Every [`Error`] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be sent or no response arrived.
    Transport,
    /// The caller's cancellation token fired.
    Cancelled,
    /// 401, or 403 after crumb re-acquisition.
    Authentication,
    /// 403 not caused by a stale crumb.
    Authorization,
    NotFound,
    /// 409 on create or update.
    Conflict,
    /// Any other non-2xx status.
    Server,
    /// 2xx with a body that does not parse.
    Decode,
    /// 2xx missing something the protocol requires, e.g. a `Location` header.
    Protocol,
    /// Invalid client configuration.
    Config,
    /// Local file I/O.
    Io,
}

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The connection was closed by the caller.
    #[error("connection is closed")]
    Closed,

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request cancelled")]
    Cancelled,

    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Forbidden: {0}")]
    Authorization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server returned an error response.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Short description taken from the body or the status line.
        message: String,
        /// The response body, when it was JSON.
        body: Option<serde_json::Value>,
    },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML decoding failed.
    #[error("XML error: {0}")]
    Xml(#[from] jenkins_xml::XmlError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Closed => ErrorKind::Transport,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Authorization(_) => ErrorKind::Authorization,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Server { .. } => ErrorKind::Server,
            Error::Json(_) | Error::Xml(_) => ErrorKind::Decode,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::InvalidUrl(_) | Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status observed, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Authentication { status, .. } => Some(*status),
            Error::Authorization(_) => Some(403),
            Error::NotFound(_) => Some(404),
            Error::Conflict(_) => Some(409),
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Typed not-found for an entity, e.g. `Error::not_found("node", "agent-1")`.
    pub fn not_found(what: &str, name: &str) -> Self {
        Error::NotFound(format!("no {what} named '{name}'"))
    }

    /// Translate a 404 from a state-changing call into a typed not-found.
    pub fn or_not_found(self, what: &str, name: &str) -> Self {
        match self {
            Error::Server { status: 404, .. } | Error::NotFound(_) => Error::not_found(what, name),
            other => other,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is an authentication or authorization error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Authentication | ErrorKind::Authorization
        )
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server { status, .. } if *status >= 500)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Transient transport failures that happened before any response,
    /// including a peer that hung up mid-request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.status().is_none()
                    && (e.is_connect() || e.is_timeout() || e.is_request() || connection_dropped(e))
            }
            _ => false,
        }
    }
}

/// Whether an I/O error in the source chain says the peer went away.
fn connection_dropped(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind::{BrokenPipe, ConnectionAborted, ConnectionReset, UnexpectedEof};

    let mut source = Some(err);
    while let Some(e) = source {
        source = match e.downcast_ref::<std::io::Error>() {
            Some(io) if matches!(io.kind(), ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof) => {
                return true;
            }
            // A wrapped error's own source is skipped by `io::Error::source`.
            Some(io) => match io.get_ref() {
                Some(inner) => Some(inner as &(dyn std::error::Error + 'static)),
                None => e.source(),
            },
            None => e.source(),
        };
    }
    false
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
