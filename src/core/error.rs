//! Core error types.

use std::fmt;

/// Core errors for request context handling.
#[derive(Debug)]
pub enum Error {
    /// The context is done or aborted; the response can no longer change.
    Locked,

    /// The payload handed to an emitter has the wrong shape.
    InvalidPayload,

    /// Status code is not part of the known registry.
    InvalidStatusCode(u16),

    /// Timeout must be above zero (or cleared with `None`).
    InvalidTimeout(u64),

    /// A relative redirect needs a host and none could be resolved.
    UnknownHost,

    /// The request timed out and was aborted.
    TimedOut {
        duration_ms: u64,
    },

    /// Cookie name or value rejected by the jar.
    InvalidCookie {
        name: String,
        reason: &'static str,
    },

    /// Request body could not be parsed.
    BodyParse(String),

    /// Transport failed to produce or deliver a stream.
    Transport(String),

    /// Outbound fetch failed.
    Fetch(String),

    /// I/O error.
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),

    /// Custom error with message.
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Locked => f.write_str("Cannot modify a finalized response"),
            Error::InvalidPayload => f.write_str("Invalid Payload"),
            Error::InvalidStatusCode(code) => write!(f, "Invalid status code {}", code),
            Error::InvalidTimeout(_) => f.write_str("Expects a value above 0 or null"),
            Error::UnknownHost => f.write_str("Unable to determine host"),
            Error::TimedOut { .. } => f.write_str("Request timed out"),
            Error::InvalidCookie { name, reason } => {
                write!(f, "Invalid cookie '{}': {}", name, reason)
            }
            Error::BodyParse(msg) => write!(f, "body parse error: {}", msg),
            Error::Transport(msg) => write!(f, "transport error: {}", msg),
            Error::Fetch(msg) => write!(f, "fetch error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BodyParse(e.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
