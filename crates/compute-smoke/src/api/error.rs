//! Compute API error classification
//!
//! Client operations return typed errors; callers classify them by HTTP
//! status rather than by matching on message text.

use thiserror::Error;

/// Error returned by a [`ComputeApi`](super::ComputeApi) operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend answered with a non-success status
    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("{operation} failed in transport: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The response body could not be decoded
    #[error("{operation} returned a malformed body: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

/// Status codes the backend uses for "resource is in use" on delete
const IN_USE_CODES: &[u16] = &[400, 409];

/// Status codes meaning the resource does not exist
const NOT_FOUND_CODES: &[u16] = &[404];

impl ApiError {
    /// Build a status error
    pub fn status(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            operation,
            status,
            message: message.into(),
        }
    }

    /// HTTP status, if the backend answered at all
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }

    /// Name of the client operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Status { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }

    /// Backend message, or the transport/decode description
    pub fn message(&self) -> &str {
        match self {
            Self::Status { message, .. }
            | Self::Transport { message, .. }
            | Self::Decode { message, .. } => message,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.http_status().is_some_and(|s| NOT_FOUND_CODES.contains(&s))
    }

    /// Check if this is a "bad request / conflict" error (resource in use)
    pub fn is_in_use(&self) -> bool {
        self.http_status().is_some_and(|s| IN_USE_CODES.contains(&s))
    }

    /// Check if this is a 409 conflict
    pub fn is_conflict(&self) -> bool {
        self.http_status() == Some(409)
    }

    /// Check if the failure happened below HTTP (no status available)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }
}

/// Map a "not found" error to `Ok(None)`, pass everything else through.
///
/// Used by cleanup paths where a resource that is already gone counts as
/// successfully deleted.
pub fn ignore_not_found<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
