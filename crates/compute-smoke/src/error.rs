//! Harness error kinds
//!
//! Scenarios distinguish four situations: an assertion did not hold, the
//! backend refused an operation because a resource is in use, a polled
//! condition never came true, and everything else the client reported.

use crate::api::ApiError;
use std::time::Duration;
use thiserror::Error;

/// Error produced by a harness operation or a scenario body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// An assertion about the backend's answer did not hold
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backend rejected the operation because the resource is in use
    /// (or the target server is gone)
    #[error("conflict on {resource}: {message} (HTTP {status})")]
    Conflict {
        resource: String,
        status: u16,
        message: String,
    },

    /// A polled condition was not reached in time
    #[error("timed out waiting for {resource} after {elapsed:?} ({attempts} attempts)")]
    Timeout {
        resource: String,
        elapsed: Duration,
        attempts: u32,
    },

    /// Any other client error, passed through unchanged
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Coarse classification of a [`HarnessError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailure,
    Conflict,
    Timeout,
    /// Backend answered with an unexpected HTTP status
    Api,
    /// No usable answer (network or decode failure)
    Transport,
}

impl HarnessError {
    /// Build a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Turn an in-use client error into [`HarnessError::Conflict`]
    pub fn conflict(resource: impl Into<String>, error: &ApiError) -> Self {
        Self::Conflict {
            resource: resource.into(),
            status: error.http_status().unwrap_or_default(),
            message: error.message().to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Api(e) if e.is_transport() => ErrorKind::Transport,
            Self::Api(_) => ErrorKind::Api,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias for harness operations
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            HarnessError::validation("x").kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(
            HarnessError::Timeout {
                resource: "server s-1 ACTIVE".into(),
                elapsed: Duration::from_secs(3),
                attempts: 4
            }
            .kind(),
            ErrorKind::Timeout
        );

        let status = HarnessError::from(ApiError::status("get_server", 500, "boom"));
        assert_eq!(status.kind(), ErrorKind::Api);

        let transport = HarnessError::from(ApiError::Transport {
            operation: "get_server",
            message: "reset".into(),
        });
        assert_eq!(transport.kind(), ErrorKind::Transport);
    }

    #[test]
    fn conflict_carries_status_and_message() {
        let api = ApiError::status("delete_security_group", 400, "Security group is still in use");
        let err = HarnessError::conflict("security group sg-1", &api);
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "conflict on security group sg-1: Security group is still in use (HTTP 400)"
        );
    }

    #[test]
    fn api_errors_pass_through_unchanged() {
        let api = ApiError::status("list_security_groups", 503, "unavailable");
        let err: HarnessError = api.clone().into();
        assert_eq!(err, HarnessError::Api(api.clone()));
        assert_eq!(err.to_string(), api.to_string());
    }
}
