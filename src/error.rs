//! Error types shared by the transport, session and store layers
//!
//! Three families of failure reach callers:
//! - network/timeout: no response was received (`status()` is `None`)
//! - HTTP: the server answered with a non-2xx status and maybe a `message`
//! - local preconditions: e.g. refreshing without a refresh token

use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced by API calls and the stores built on top of them
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request did not complete within the transport timeout
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Connection refused, DNS failure, reset, etc.
    #[error("network error: {0}")]
    Network(String),

    /// Server responded with a non-2xx status
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("request failed"))]
    Http {
        status: u16,
        /// `message` field of the JSON error body, if the server sent one
        message: Option<String>,
        /// Raw response body, kept for logging
        body: String,
    },

    /// Response arrived but its body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// `refresh()` was called with no refresh token in the session
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// Durable session storage could not be read or written
    #[error("session storage error: {0}")]
    Storage(String),

    /// The request could not be built (bad upload content type, bad URL)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status for server errors, `None` for everything else
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message supplied by the server in the error body
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }

    /// True when no response was received at all
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network(_))
    }

    /// True for 401 responses
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Text to show a user: the server's message when present, otherwise `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result of an operation whose failure must never block the caller
///
/// Logout's remote call is the main user: local state is cleared no matter
/// what, and this value just reports what happened on the wire.
#[derive(Debug, Clone)]
pub enum BestEffort {
    /// The remote call succeeded
    Completed,
    /// There was nothing to do remotely
    Skipped,
    /// The remote call failed; the failure has already been logged
    Failed(ApiError),
}

impl BestEffort {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The swallowed error, if any
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
