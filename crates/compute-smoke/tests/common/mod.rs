//! Shared helpers for compute-smoke integration tests

#![allow(dead_code)]

pub mod compute_stub;

use compute_smoke::api::{SimulatedCompute, SimulatorConfig};
use compute_smoke::config::{HarnessConfig, WaitSettings};
use compute_smoke::runner::Runner;
use std::sync::Arc;
use std::time::Duration;

/// Harness config with short polls and deadlines (runs under a paused clock)
pub fn fast_config() -> HarnessConfig {
    compute_smoke_test_utils::init_test_tracing();
    HarnessConfig {
        waits: WaitSettings {
            poll_interval: Duration::from_millis(50),
            status_timeout: Duration::from_secs(10),
            termination_timeout: Duration::from_secs(10),
            deletion_timeout: Duration::from_secs(5),
        },
        ..HarnessConfig::default()
    }
}

/// Simulator plus a runner driving it
pub fn sim_runner(
    sim_config: SimulatorConfig,
    config: HarnessConfig,
) -> (Arc<SimulatedCompute>, Runner<SimulatedCompute>) {
    let sim = Arc::new(SimulatedCompute::with_config(sim_config));
    let runner = Runner::new(sim.clone(), config);
    (sim, runner)
}

/// Assert the simulator holds nothing
pub fn assert_backend_empty(sim: &SimulatedCompute) {
    assert_eq!(
        sim.security_group_ids(),
        Vec::<String>::new(),
        "security groups left behind"
    );
    assert_eq!(sim.server_ids(), Vec::<String>::new(), "servers left behind");
}
