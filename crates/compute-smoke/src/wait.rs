//! Polling for asynchronous backend state changes.
//!
//! Server status transitions and deletions complete in the background on the
//! backend; callers observe them by re-checking until a condition holds or a
//! timeout fires.

use crate::error::HarnessError;
use backon::{BackoffBuilder, ExponentialBuilder};
use compute_smoke_common::defaults::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_STATUS_TIMEOUT_SECS};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Polling schedule and deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Delay before the second check
    pub initial_delay: Duration,
    /// Cap on the delay between checks
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
    /// Randomize delays (off for fixed-interval polling)
    pub jitter: bool,
}

impl WaitConfig {
    /// Poll at a constant interval until `timeout`
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            timeout,
            jitter: false,
        }
    }

    /// Same schedule with a different deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::fixed(
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            Duration::from_secs(DEFAULT_STATUS_TIMEOUT_SECS),
        )
    }
}

/// Wait for a condition to become true.
///
/// `check` returns `Ok(true)` when done and `Ok(false)` to poll again; an
/// `Err` aborts the wait and is returned as is. The check always runs at
/// least once, even with a zero timeout.
///
/// # Returns
/// * `Ok(attempts)` - condition reached after `attempts` checks
/// * `Err(HarnessError::Timeout)` - deadline passed first
pub async fn wait_for_resource<F, Fut>(
    config: &WaitConfig,
    check: F,
    resource_name: &str,
) -> Result<u32, HarnessError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, HarnessError>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0);
    if config.jitter {
        builder = builder.with_jitter();
    }
    let mut delays = builder.build();

    loop {
        attempts += 1;

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Condition reached");
                return Ok(attempts);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(resource = %resource_name, error = %e, "Check failed while waiting");
                return Err(e);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            warn!(
                resource = %resource_name,
                timeout = ?config.timeout,
                attempts,
                "Timed out waiting"
            );
            return Err(HarnessError::Timeout {
                resource: resource_name.to_string(),
                elapsed,
                attempts,
            });
        }

        // Never sleep past the deadline; one last check happens right at it
        let delay = delays
            .next()
            .unwrap_or(config.max_delay)
            .min(config.timeout - elapsed);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Not ready, polling again"
        );
        tokio::time::sleep(delay).await;
    }
}
