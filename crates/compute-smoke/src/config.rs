//! Configuration types for the harness

use crate::wait::WaitConfig;
use compute_smoke_common::Service;
use compute_smoke_common::defaults::{
    DEFAULT_DELETION_TIMEOUT_SECS, DEFAULT_FLAVOR_REF, DEFAULT_IMAGE_REF, DEFAULT_NAME_PREFIX,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATUS_TIMEOUT_SECS,
    DEFAULT_TERMINATION_TIMEOUT_SECS,
};
use std::time::Duration;

/// Polling behaviour for asynchronous backend changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    /// Fixed delay between polls
    pub poll_interval: Duration,
    /// Default deadline for server status changes
    pub status_timeout: Duration,
    /// Deadline for a deleted server to disappear
    pub termination_timeout: Duration,
    /// Deadline for a deleted group to drop out of listings
    pub deletion_timeout: Duration,
}

impl WaitSettings {
    pub fn status(&self) -> WaitConfig {
        WaitConfig::fixed(self.poll_interval, self.status_timeout)
    }

    pub fn termination(&self) -> WaitConfig {
        WaitConfig::fixed(self.poll_interval, self.termination_timeout)
    }

    pub fn deletion(&self) -> WaitConfig {
        WaitConfig::fixed(self.poll_interval, self.deletion_timeout)
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            status_timeout: Duration::from_secs(DEFAULT_STATUS_TIMEOUT_SECS),
            termination_timeout: Duration::from_secs(DEFAULT_TERMINATION_TIMEOUT_SECS),
            deletion_timeout: Duration::from_secs(DEFAULT_DELETION_TIMEOUT_SECS),
        }
    }
}

/// Parameters for servers booted by scenarios
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Image reference to boot from
    pub image_ref: String,
    /// Flavor reference (size) to boot with
    pub flavor_ref: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            image_ref: DEFAULT_IMAGE_REF.to_string(),
            flavor_ref: DEFAULT_FLAVOR_REF.to_string(),
        }
    }
}

/// Configuration for a harness run
///
/// Composed of focused sub-configs; each scenario gets a harness built from
/// a clone of this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Prefix for every generated resource name (also used by the sweeper)
    pub name_prefix: String,
    pub waits: WaitSettings,
    pub server: ServerSettings,
    /// Services available on the target cloud
    pub enabled_services: Vec<Service>,
    /// Leave created resources on the backend for inspection
    pub keep_resources: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            waits: WaitSettings::default(),
            server: ServerSettings::default(),
            enabled_services: vec![Service::Compute, Service::Network],
            keep_resources: false,
        }
    }
}

/// Which client implementation to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// In-memory simulator
    #[default]
    Sim,
    /// Live compute endpoint over HTTP
    Http,
}

/// How to reach the compute backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Compute API base URL (required for `Http`)
    pub endpoint: Option<String>,
    /// Pre-issued auth token
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Sim,
            endpoint: None,
            token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_wait_configs_share_poll_interval() {
        let waits = WaitSettings {
            poll_interval: Duration::from_millis(250),
            ..WaitSettings::default()
        };
        assert_eq!(waits.status().initial_delay, Duration::from_millis(250));
        assert_eq!(waits.deletion().max_delay, Duration::from_millis(250));
        assert_eq!(
            waits.termination().timeout,
            Duration::from_secs(DEFAULT_TERMINATION_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_backend_kind_parses_lowercase() {
        assert_eq!(BackendKind::from_str("sim").unwrap(), BackendKind::Sim);
        assert_eq!(BackendKind::from_str("http").unwrap(), BackendKind::Http);
        assert!(BackendKind::from_str("grpc").is_err());
        assert_eq!(BackendKind::Http.to_string(), "http");
    }

    #[test]
    fn test_default_enables_everything_and_cleans_up() {
        let config = HarnessConfig::default();
        assert!(config.enabled_services.contains(&Service::Network));
        assert!(config.enabled_services.contains(&Service::Compute));
        assert!(!config.keep_resources);
    }
}
