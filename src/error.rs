//! Error handling for the pi_everywhere crate.

use crate::device::ChannelRole;
use crate::model::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A specialized `Result` type for pi_everywhere operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// The main error type for store, facade and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Query bounds are reversed or otherwise malformed
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    /// Channel is not configured for the requested role
    #[error("Channel {channel} is not configured as {role}")]
    UnsupportedChannel { channel: Channel, role: ChannelRole },

    /// Transport error, non-2xx status or undecodable body from a remote peer
    #[error("Remote request failed{}: {message}", status_suffix(.status))]
    RemoteFailure { status: Option<u16>, message: String },

    /// Remote peer did not answer within the client timeout
    #[error("Remote request timed out: {0}")]
    Timeout(String),

    /// Payload does not match the expected schema
    #[error("Failed to decode {what}: {message}")]
    DecodeFailure { what: String, message: String },

    /// No record exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// The dispatcher exhausted its handler list
    #[error("No handler accepts {0}")]
    NoMatchingHandler(String),

    /// The facade variant cannot perform this operation at all
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// GPIO, SPI or ADC access failed
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Storage backend failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl RelayError {
    /// Create a new invalid range error
    pub fn invalid_range(start: impl fmt::Display, end: impl fmt::Display) -> Self {
        Self::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// Create a new unsupported channel error
    pub fn unsupported_channel(channel: Channel, role: ChannelRole) -> Self {
        Self::UnsupportedChannel { channel, role }
    }

    /// Create a new remote failure
    pub fn remote_failure(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::RemoteFailure {
            status,
            message: msg.into(),
        }
    }

    /// Create a new decode failure
    pub fn decode_failure(what: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::DecodeFailure {
            what: what.into(),
            message: msg.to_string(),
        }
    }

    /// Create a new not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a new hardware error
    pub fn hardware_error(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }

    /// Create a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The externally visible kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::UnsupportedChannel { .. } => ErrorKind::UnsupportedChannel,
            Self::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoMatchingHandler(_) => ErrorKind::NoMatchingHandler,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Hardware(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::WebServer(_)
            | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Structured body sent across the HTTP boundary.
    ///
    /// Internal failures only carry a generic description; the detail stays in the logs.
    pub fn to_body(&self) -> ApiErrorBody {
        let kind = self.kind();
        let description = match kind {
            ErrorKind::InternalError => "internal error".to_string(),
            _ => self.to_string(),
        };
        ApiErrorBody { kind, description }
    }
}

/// Error categories visible to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRange,
    UnsupportedChannel,
    RemoteFailure,
    Timeout,
    DecodeFailure,
    NotFound,
    NoMatchingHandler,
    Unsupported,
    InternalError,
}

impl ErrorKind {
    /// HTTP status code used when this kind crosses the HTTP boundary.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidRange | Self::UnsupportedChannel | Self::DecodeFailure => 400,
            Self::NotFound | Self::NoMatchingHandler => 404,
            Self::Unsupported => 501,
            Self::RemoteFailure => 502,
            Self::Timeout => 504,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// JSON error body: `{"kind": "...", "description": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub kind: ErrorKind,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = RelayError::storage_error("disk /dev/mmcblk0p2 full");
        let body = err.to_body();
        assert_eq!(body.kind, ErrorKind::InternalError);
        assert!(!body.description.contains("mmcblk0p2"));
    }

    #[test]
    fn test_remote_failure_display() {
        let err = RelayError::remote_failure(Some(503), "peer unavailable");
        assert_eq!(
            err.to_string(),
            "Remote request failed (HTTP 503): peer unavailable"
        );
        assert_eq!(err.kind().http_status(), 502);
    }

    #[test]
    fn test_error_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::InvalidRange).unwrap();
        assert_eq!(json, "\"InvalidRange\"");
    }
}
