//! Typed failures of a detection call.
//!
//! Everything else in the crate (config, export files, rendering) reports
//! through `anyhow`; detection failures get their own enum so the workbench
//! and the CLIs can tell the kinds apart.

use std::fmt;

use thiserror::Error;

/// Single collapsed message shown when a caller does not differentiate kinds.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Failed to detect objects. Please try again or check your API key.";

/// Why the remote call could not complete.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    /// DNS, connect, TLS, read or timeout failure.
    Network,
    /// Missing credential, or the service answered 401/403.
    Unauthenticated,
    /// The service answered 429.
    RateLimited,
    /// Any other non-success HTTP status.
    HttpStatus(u16),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Network => f.write_str("network"),
            TransportFailure::Unauthenticated => f.write_str("unauthenticated"),
            TransportFailure::RateLimited => f.write_str("rate limited"),
            TransportFailure::HttpStatus(code) => write!(f, "http {}", code),
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportFailure,
        message: String,
    },

    #[error("inference service returned no content")]
    EmptyResponse,

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
}

/// Coarse error kind, for presentation and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectErrorKind {
    Transport,
    EmptyResponse,
    MalformedResponse,
    InvalidPayload,
}

impl DetectError {
    pub fn transport<S: Into<String>>(kind: TransportFailure, message: S) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn invalid_payload<S: Into<String>>(message: S) -> Self {
        Self::InvalidPayload(message.into())
    }

    pub fn kind(&self) -> DetectErrorKind {
        match self {
            DetectError::Transport { .. } => DetectErrorKind::Transport,
            DetectError::EmptyResponse => DetectErrorKind::EmptyResponse,
            DetectError::MalformedResponse(_) => DetectErrorKind::MalformedResponse,
            DetectError::InvalidPayload(_) => DetectErrorKind::InvalidPayload,
        }
    }

    /// User-facing message, one per kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            DetectError::Transport {
                kind: TransportFailure::Unauthenticated,
                ..
            } => "The inference service rejected the request. Check your API key.",
            DetectError::Transport {
                kind: TransportFailure::RateLimited,
                ..
            } => "The inference service is rate limiting requests. Wait a moment and try again.",
            DetectError::Transport { .. } => {
                "Could not reach the inference service. Check your connection and try again."
            }
            DetectError::EmptyResponse => {
                "The inference service returned no result. Please try again."
            }
            DetectError::MalformedResponse(_) => {
                "The inference service returned an unreadable result. Please try again."
            }
            DetectError::InvalidPayload(_) => "The selected file could not be used as an image.",
        }
    }
}
