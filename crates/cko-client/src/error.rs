//! Order-intake backend error types.

use std::fmt;

/// Errors from backend calls. Every variant names the endpoint it came from.
///
/// Messages are captured as strings so errors can be cloned into scripted
/// test doubles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (connect, DNS, reset).
    Transport { endpoint: String, message: String },
    /// Non-2xx status.
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 2xx, but the body did not decode.
    Decode { endpoint: String, message: String },
    /// 2xx with `success: false`, or a success without the promised payload.
    Rejected { endpoint: String, message: String },
    /// Base URL cannot carry endpoint paths.
    Config(String),
}

impl ApiError {
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ApiError::Transport { endpoint, .. }
            | ApiError::Status { endpoint, .. }
            | ApiError::Decode { endpoint, .. }
            | ApiError::Rejected { endpoint, .. } => Some(endpoint),
            ApiError::Config(_) => None,
        }
    }

    /// `true` when no HTTP response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport { endpoint, message } => {
                write!(f, "transport error calling {endpoint}: {message}")
            }
            ApiError::Status {
                endpoint,
                status,
                body,
            } => write!(f, "{endpoint} returned {status}: {body}"),
            ApiError::Decode { endpoint, message } => {
                write!(f, "failed to decode response from {endpoint}: {message}")
            }
            ApiError::Rejected { endpoint, message } => {
                write!(f, "{endpoint} rejected the request: {message}")
            }
            ApiError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
