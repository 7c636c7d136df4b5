//! Error taxonomy shared by the backend client, router and proxy layers.
//!
//! # Design Decisions
//! - HTTP-status failures (`Client`) are distinct from transport failures so
//!   callers can pick different retry strategies
//! - No variant is retried internally
//! - Only the edge layer turns these into HTTP responses

use reqwest::StatusCode;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend answered with a status outside the operation's allow-set,
    /// or a proxy ticket could not be obtained.
    #[error("backend returned {status}: {message}")]
    Client { status: StatusCode, message: String },

    /// No configured route matches the requested path.
    #[error("no route matches path {path}")]
    Routing { path: String },

    /// Connect, IO or timeout failure talking to a backend.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend client was closed before the call started.
    #[error("backend client is closed")]
    Closed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// A create operation succeeded without a `Location` header.
    #[error("response has no Location header")]
    MissingLocation,

    /// The `Location` header does not end with a numeric id.
    #[error("cannot extract id from location {0}")]
    InvalidLocation(String),
}

impl Error {
    pub fn client(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Client {
            status,
            message: message.into(),
        }
    }

    /// True for connection-level failures, including use after close.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Closed)
    }

    /// The backend status carried by a `Client` error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidArgument(format!("invalid URL: {e}"))
    }
}
