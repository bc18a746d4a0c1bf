//! Canonical server lifecycle statuses
//!
//! Status strings as reported by the compute API. Values the harness does not
//! know about are kept verbatim in [`ServerStatus::Other`] rather than
//! rejected, since backends add statuses over time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server status as reported by the compute API
///
/// Transitions happen asynchronously on the backend after create, reboot and
/// delete; callers observe them by polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum ServerStatus {
    /// Being built after create
    #[strum(serialize = "BUILD")]
    Build,
    /// Running and usable
    #[strum(serialize = "ACTIVE")]
    Active,
    /// Soft reboot in progress
    #[strum(serialize = "REBOOT")]
    Reboot,
    /// Hard reboot in progress
    #[strum(serialize = "HARD_REBOOT")]
    HardReboot,
    /// Powered off
    #[strum(serialize = "SHUTOFF")]
    ShutOff,
    /// Deleted but still visible
    #[strum(serialize = "DELETED")]
    Deleted,
    /// Terminated and about to disappear
    #[strum(serialize = "TERMINATED")]
    Terminated,
    /// Failed
    #[strum(serialize = "ERROR")]
    Error,
    /// Any status this crate does not model
    #[strum(default)]
    Other(String),
}

impl ServerStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &str {
        match self {
            Self::Build => "BUILD",
            Self::Active => "ACTIVE",
            Self::Reboot => "REBOOT",
            Self::HardReboot => "HARD_REBOOT",
            Self::ShutOff => "SHUTOFF",
            Self::Deleted => "DELETED",
            Self::Terminated => "TERMINATED",
            Self::Error => "ERROR",
            Self::Other(s) => s,
        }
    }

    /// Check if the server is gone for good (no longer holds resources)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::Terminated)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ServerStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Other(s))
    }
}

impl From<ServerStatus> for String {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}
