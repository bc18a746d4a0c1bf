//! Scenario runner
//!
//! Each scenario gets its own registry, cleanup executor and harness. The body
//! runs under panic isolation; afterwards the executor is shut down and
//! awaited, so everything the scenario leaked is deleted before the next one
//! starts. In keep-resources mode nothing is deleted and the leftovers are
//! listed in the report instead.

use crate::api::ComputeApi;
use crate::config::HarnessConfig;
use crate::error::{ErrorKind, HarnessError};
use crate::harness::Harness;
use crate::resource_guard::{
    CleanupReport, ResourceGuardBuilder, ResourceRegistry, create_cleanup_system,
};
use crate::scenario::Scenario;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How a scenario ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    /// An assertion did not hold
    Failed(String),
    /// The scenario could not complete (timeout, client error, panic)
    Errored(String),
    /// Not run; a required service is disabled
    Skipped(String),
}

impl ScenarioOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed(_) => "FAIL",
            Self::Errored(_) => "ERROR",
            Self::Skipped(_) => "SKIP",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed(d) | Self::Errored(d) | Self::Skipped(d) => Some(d),
        }
    }

    /// Map a scenario error onto an outcome
    ///
    /// A conflict that escapes the body was not expected by the scenario, so
    /// it counts as a failed assertion.
    pub fn from_error(error: &HarnessError) -> Self {
        match error.kind() {
            ErrorKind::ValidationFailure | ErrorKind::Conflict => Self::Failed(error.to_string()),
            ErrorKind::Timeout | ErrorKind::Api | ErrorKind::Transport => {
                Self::Errored(error.to_string())
            }
        }
    }
}

/// Result of a single scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    pub cleanup: CleanupReport,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    fn count(&self, label: &str) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.outcome.label() == label)
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count("PASS")
    }

    pub fn failed(&self) -> usize {
        self.count("FAIL")
    }

    pub fn errored(&self) -> usize {
        self.count("ERROR")
    }

    pub fn skipped(&self) -> usize {
        self.count("SKIP")
    }

    /// True when nothing failed or errored
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.errored() == 0
    }

    /// Human-readable summary table
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<40} {:<6} {:>10} {:>8}  DETAIL",
            "SCENARIO", "RESULT", "DURATION", "CLEANED"
        );
        let _ = writeln!(out, "{}", "-".repeat(80));
        for s in &self.scenarios {
            let _ = writeln!(
                out,
                "{:<40} {:<6} {:>8}ms {:>8}  {}",
                s.name,
                s.outcome.label(),
                s.duration_ms,
                s.cleanup.deleted.len(),
                s.outcome.detail().unwrap_or(""),
            );
        }
        let _ = writeln!(
            out,
            "\nRun {}: {} passed, {} failed, {} errored, {} skipped",
            self.run_id,
            self.passed(),
            self.failed(),
            self.errored(),
            self.skipped()
        );
        out
    }
}

/// Runs scenarios sequentially against one backend
pub struct Runner<C> {
    api: Arc<C>,
    config: HarnessConfig,
}

impl<C: ComputeApi + 'static> Runner<C> {
    pub fn new(api: Arc<C>, config: HarnessConfig) -> Self {
        Self { api, config }
    }

    /// Run every scenario in order
    pub async fn run(&self, scenarios: &[Scenario<C>]) -> RunReport {
        let run_id = Uuid::now_v7().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, count = scenarios.len(), "Starting scenario run");

        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run_scenario(scenario).await);
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            scenarios: reports,
        };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            errored = report.errored(),
            skipped = report.skipped(),
            "Scenario run complete"
        );
        report
    }

    /// Run one scenario with guaranteed cleanup
    pub async fn run_scenario(&self, scenario: &Scenario<C>) -> ScenarioReport {
        if let Some(service) = scenario.missing_service(&self.config.enabled_services) {
            info!(scenario = scenario.name, service = %service, "Skipping scenario");
            return ScenarioReport {
                name: scenario.name.to_string(),
                outcome: ScenarioOutcome::Skipped(format!("service {service} is not enabled")),
                error_kind: None,
                duration_ms: 0,
                cleanup: CleanupReport::default(),
            };
        }

        info!(scenario = scenario.name, "Running scenario");
        let start = Instant::now();

        let (registry, executor) =
            create_cleanup_system(self.api.clone(), self.config.waits.termination());
        registry.set_keep_resources(self.config.keep_resources);
        let cleanup_task = tokio::spawn(executor.run());
        let harness = Harness::new(
            self.api.clone(),
            self.config.clone(),
            ResourceGuardBuilder::new(registry.clone(), scenario.name),
        );

        // The body future (and every guard it holds) is dropped before this
        // statement ends, panic or not
        let result = AssertUnwindSafe((scenario.run)(&harness))
            .catch_unwind()
            .await;
        drop(harness);

        let kept = if registry.keeps_resources() {
            kept_resources(scenario.name, &registry)
        } else {
            let leaked = registry.flush();
            if leaked > 0 {
                warn!(scenario = scenario.name, count = leaked, "Guards leaked; queued for cleanup");
            }
            Vec::new()
        };
        registry.shutdown();
        let mut cleanup = match cleanup_task.await {
            Ok(report) => report,
            Err(e) => {
                error!(scenario = scenario.name, error = %e, "Cleanup executor failed");
                CleanupReport::default()
            }
        };
        cleanup.kept = kept;

        let (mut outcome, error_kind) = match result {
            Ok(Ok(())) => (ScenarioOutcome::Passed, None),
            Ok(Err(e)) => (ScenarioOutcome::from_error(&e), Some(e.kind())),
            Err(payload) => (
                ScenarioOutcome::Errored(format!("panicked: {}", panic_message(&*payload))),
                None,
            ),
        };

        if !cleanup.is_clean() && outcome == ScenarioOutcome::Passed {
            outcome = ScenarioOutcome::Errored(format!(
                "cleanup failed for {} resource(s)",
                cleanup.failed.len()
            ));
        }

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            ScenarioOutcome::Passed => {
                info!(scenario = scenario.name, duration_ms, "Scenario passed")
            }
            other => warn!(
                scenario = scenario.name,
                result = other.label(),
                detail = other.detail().unwrap_or(""),
                "Scenario did not pass"
            ),
        }

        ScenarioReport {
            name: scenario.name.to_string(),
            outcome,
            error_kind,
            duration_ms,
            cleanup,
        }
    }
}

/// Describe and log what keep-resources mode left on the backend
fn kept_resources(scenario: &str, registry: &ResourceRegistry) -> Vec<String> {
    let mut kept: Vec<_> = registry
        .all_resources()
        .into_iter()
        .map(|(resource, meta)| {
            warn!(
                scenario,
                resource = %resource.description(),
                name = ?meta.name,
                "Keeping resource"
            );
            resource.description()
        })
        .collect();
    kept.sort();
    kept
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use std::time::Duration;

    #[test]
    fn test_outcome_from_error_kind() {
        assert!(matches!(
            ScenarioOutcome::from_error(&HarnessError::validation("x")),
            ScenarioOutcome::Failed(_)
        ));
        let conflict = HarnessError::conflict(
            "security group sg-1",
            &ApiError::status("delete_security_group", 409, "in use"),
        );
        assert!(matches!(
            ScenarioOutcome::from_error(&conflict),
            ScenarioOutcome::Failed(_)
        ));
        let timeout = HarnessError::Timeout {
            resource: "server s-1 ACTIVE".into(),
            elapsed: Duration::from_secs(1),
            attempts: 2,
        };
        assert!(matches!(
            ScenarioOutcome::from_error(&timeout),
            ScenarioOutcome::Errored(_)
        ));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(ScenarioOutcome::Skipped("no network".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outcome": "skipped", "detail": "no network"})
        );
        let json = serde_json::to_value(ScenarioOutcome::Passed).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "passed"}));
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*owned), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*borrowed), "static");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }

    #[test]
    fn test_table_lists_every_scenario() {
        let report = RunReport {
            run_id: "run-1".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            scenarios: vec![
                ScenarioReport {
                    name: "a".into(),
                    outcome: ScenarioOutcome::Passed,
                    error_kind: None,
                    duration_ms: 12,
                    cleanup: CleanupReport::default(),
                },
                ScenarioReport {
                    name: "b".into(),
                    outcome: ScenarioOutcome::Failed("boom".into()),
                    error_kind: Some(ErrorKind::ValidationFailure),
                    duration_ms: 3,
                    cleanup: CleanupReport::default(),
                },
            ],
        };

        let table = report.render_table();
        assert!(table.contains("PASS"));
        assert!(table.contains("boom"));
        assert!(table.contains("1 passed, 1 failed, 0 errored, 0 skipped"));
        assert!(!report.is_success());
    }
}
