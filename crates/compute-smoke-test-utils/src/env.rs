//! Live backend test utilities
//!
//! Provides endpoint detection and unique run ID generation for integration
//! tests that talk to a real compute API.

use chrono::Utc;

/// Environment variable holding the compute API base URL
pub const ENDPOINT_VAR: &str = "COMPUTE_SMOKE_ENDPOINT";

/// Environment variable holding a pre-issued auth token
pub const TOKEN_VAR: &str = "COMPUTE_SMOKE_TOKEN";

/// Get the compute endpoint for live tests.
///
/// Returns `None` when `COMPUTE_SMOKE_ENDPOINT` is unset or blank, so live
/// tests can bail out early.
pub fn get_test_endpoint() -> Option<String> {
    std::env::var(ENDPOINT_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get the auth token for live tests, if any.
pub fn get_test_token() -> Option<String> {
    std::env::var(TOKEN_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`. The counter keeps IDs unique
/// even when tests start within the same millisecond.
///
/// # Example
///
/// ```
/// use compute_smoke_test_utils::env::test_run_id;
///
/// let run_id = test_run_id();
/// assert!(run_id.starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

/// Name prefix for resources created by one test.
///
/// Format: `compute-smoke-{run_id}`; still matched by the default orphan
/// sweep prefix.
///
/// # Example
///
/// ```
/// use compute_smoke_test_utils::env::test_name_prefix;
///
/// assert!(test_name_prefix().starts_with("compute-smoke-test-"));
/// ```
pub fn test_name_prefix() -> String {
    format!("compute-smoke-{}", test_run_id())
}
