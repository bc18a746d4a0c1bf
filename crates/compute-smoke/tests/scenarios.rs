//! The shipped scenario catalogue against the simulator

mod common;

use common::{assert_backend_empty, fast_config, sim_runner};
use compute_smoke::api::{SimulatedCompute, SimulatorConfig, SimulatorQuirks};
use compute_smoke::error::ErrorKind;
use compute_smoke::runner::{ScenarioOutcome, ScenarioReport};
use compute_smoke::scenario::{ScenarioFilter, all_scenarios};
use compute_smoke_common::{Service, Tag};
use std::sync::Arc;

/// Run one catalogue scenario against a misbehaving simulator
async fn run_against(
    quirks: SimulatorQuirks,
    name: &str,
) -> (Arc<SimulatedCompute>, ScenarioReport) {
    let sim_config = SimulatorConfig {
        quirks,
        ..SimulatorConfig::default()
    };
    let (sim, runner) = sim_runner(sim_config, fast_config());
    let scenarios = ScenarioFilter {
        name_contains: Some(name.to_string()),
        ..Default::default()
    }
    .apply(all_scenarios::<SimulatedCompute>());
    assert_eq!(scenarios.len(), 1, "{name} should select one scenario");

    let mut report = runner.run(&scenarios).await;
    (sim, report.scenarios.remove(0))
}

fn assert_failed_validation(report: &ScenarioReport, detail: &str) {
    match &report.outcome {
        ScenarioOutcome::Failed(message) => assert!(message.contains(detail), "{message}"),
        other => panic!("{} should fail, got {other:?}", report.name),
    }
    assert_eq!(report.error_kind, Some(ErrorKind::ValidationFailure));
    assert!(report.cleanup.is_clean(), "{:?}", report.cleanup);
}

#[tokio::test(start_paused = true)]
async fn test_all_scenarios_pass_and_leave_nothing_behind() {
    let (sim, runner) = sim_runner(SimulatorConfig::default(), fast_config());
    let scenarios = all_scenarios::<SimulatedCompute>();

    let report = runner.run(&scenarios).await;

    for s in &report.scenarios {
        assert_eq!(s.outcome, ScenarioOutcome::Passed, "{} did not pass", s.name);
        assert!(s.cleanup.is_clean(), "{} cleanup failed", s.name);
    }
    assert_eq!(report.passed(), 4);
    assert!(report.is_success());
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_update_scenario_cleaned_by_executor() {
    let (sim, runner) = sim_runner(SimulatorConfig::default(), fast_config());
    let scenarios = ScenarioFilter {
        name_contains: Some("update_security_groups".into()),
        ..Default::default()
    }
    .apply(all_scenarios::<SimulatedCompute>());

    let report = runner.run(&scenarios).await;

    assert_eq!(report.scenarios.len(), 1);
    let s = &report.scenarios[0];
    assert_eq!(s.outcome, ScenarioOutcome::Passed);
    // The body leaves its group to the guard
    assert_eq!(s.cleanup.deleted.len(), 1);
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_instant_transitions_still_pass() {
    let sim_config = SimulatorConfig {
        build_polls: 0,
        reboot_polls: 0,
        delete_polls: 0,
        ..SimulatorConfig::default()
    };
    let (sim, runner) = sim_runner(sim_config, fast_config());

    let report = runner.run(&all_scenarios::<SimulatedCompute>()).await;

    assert!(report.is_success(), "{}", report.render_table());
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_service_skips() {
    let mut config = fast_config();
    config.enabled_services = vec![Service::Compute];
    let (sim, runner) = sim_runner(SimulatorConfig::default(), config);

    let report = runner.run(&all_scenarios::<SimulatedCompute>()).await;

    assert_eq!(report.skipped(), 4);
    assert!(report.is_success());
    for s in &report.scenarios {
        assert!(matches!(&s.outcome, ScenarioOutcome::Skipped(reason) if reason.contains("network")));
    }
    assert_eq!(sim.security_group_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_json_report_shape() {
    let (_sim, runner) = sim_runner(SimulatorConfig::default(), fast_config());
    let scenarios = ScenarioFilter {
        tags: vec![Tag::Smoke],
        name_contains: Some("create_get_delete".into()),
        ..Default::default()
    }
    .apply(all_scenarios::<SimulatedCompute>());

    let report = runner.run(&scenarios).await;
    let json = serde_json::to_value(&report).unwrap();

    let scenario = &json["scenarios"][0];
    assert_eq!(scenario["name"], "security_group_create_get_delete");
    assert_eq!(scenario["outcome"], "passed");
    assert!(scenario.get("error_kind").is_none());
    assert!(scenario["cleanup"]["deleted"].as_array().unwrap().is_empty());
    assert!(json["run_id"].as_str().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_trimmed_names_fail_round_trip() {
    let quirks = SimulatorQuirks {
        trim_names: true,
        ..Default::default()
    };
    let (sim, report) = run_against(quirks, "security_group_create_get_delete").await;

    assert_failed_validation(&report, "created security group name");
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_lost_updates_fail_update_scenario() {
    let quirks = SimulatorQuirks {
        drop_updates: true,
        ..Default::default()
    };
    let (sim, report) = run_against(quirks, "update_security_groups").await;

    assert_failed_validation(&report, "fetched name");
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_accepted_in_use_delete_fails_server_scenario() {
    let quirks = SimulatorQuirks {
        delete_in_use_groups: true,
        ..Default::default()
    };
    let (sim, report) = run_against(quirks, "server_security_groups").await;

    assert_failed_validation(&report, "expected a conflict");
    assert_backend_empty(&sim);
}

#[tokio::test(start_paused = true)]
async fn test_stale_listing_times_out_deletion_wait() {
    let quirks = SimulatorQuirks {
        list_deleted_groups: true,
        ..Default::default()
    };
    let (sim, report) = run_against(quirks, "security_groups_create_list_delete").await;

    match &report.outcome {
        ScenarioOutcome::Errored(message) => assert!(message.contains("deletion"), "{message}"),
        other => panic!("Expected Errored, got {other:?}"),
    }
    assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
    // The two groups never reached by the body are still deleted by the executor
    assert_eq!(report.cleanup.deleted.len(), 2, "{:?}", report.cleanup);
    assert_backend_empty(&sim);
}
