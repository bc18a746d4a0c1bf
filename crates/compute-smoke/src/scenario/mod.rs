//! Scenario catalogue
//!
//! A scenario is a named, parameterless async body driven against a fresh
//! [`Harness`]. Tags and required services are structured metadata the runner
//! filters on.

pub mod security_groups;

use crate::api::ComputeApi;
use crate::error::{HarnessError, Result};
use crate::harness::Harness;
use compute_smoke_common::{Service, Tag};
use futures::future::LocalBoxFuture;
use std::fmt::Debug;

/// Scenario body: borrows the harness for the duration of the run
pub type ScenarioFn<C> = for<'a> fn(&'a Harness<C>) -> LocalBoxFuture<'a, Result<()>>;

/// A runnable smoke scenario
pub struct Scenario<C> {
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [Tag],
    /// Services that must be enabled for the scenario to run
    pub services: &'static [Service],
    pub run: ScenarioFn<C>,
}

// Manual impls: derive would require `C: Clone`
impl<C> Clone for Scenario<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Scenario<C> {}

impl<C> Debug for Scenario<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("services", &self.services)
            .finish()
    }
}

impl<C> Scenario<C> {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// First required service that is not in `enabled`
    pub fn missing_service(&self, enabled: &[Service]) -> Option<Service> {
        self.services
            .iter()
            .copied()
            .find(|s| !enabled.contains(s))
    }
}

/// Every scenario shipped with the crate, in run order
pub fn all_scenarios<C: ComputeApi>() -> Vec<Scenario<C>> {
    security_groups::scenarios()
}

/// Selects scenarios by tag, service and name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Scenario must carry every one of these tags
    pub tags: Vec<Tag>,
    /// When non-empty, scenario may only require these services
    pub services: Vec<Service>,
    /// Scenario name must contain this substring
    pub name_contains: Option<String>,
}

impl ScenarioFilter {
    pub fn matches<C>(&self, scenario: &Scenario<C>) -> bool {
        let tags_ok = self.tags.iter().all(|t| scenario.has_tag(*t));
        let services_ok =
            self.services.is_empty() || scenario.missing_service(&self.services).is_none();
        let name_ok = self
            .name_contains
            .as_deref()
            .is_none_or(|needle| scenario.name.contains(needle));
        tags_ok && services_ok && name_ok
    }

    /// Keep matching scenarios, preserving order
    pub fn apply<C>(&self, scenarios: Vec<Scenario<C>>) -> Vec<Scenario<C>> {
        scenarios.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Fail with a validation error unless `condition` holds
pub fn check(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::validation(message))
    }
}

/// Fail with a validation error unless `actual == expected`
pub fn check_eq<T: PartialEq + Debug + ?Sized>(actual: &T, expected: &T, what: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessError::validation(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )))
    }
}

/// Require that `result` is a conflict; anything else fails the scenario
///
/// Other errors propagate unchanged; an unexpected success is a validation
/// failure.
pub fn expect_conflict<T: Debug>(result: Result<T>, what: &str) -> Result<()> {
    match result {
        Err(e) if e.is_conflict() => Ok(()),
        Err(e) => Err(e),
        Ok(value) => Err(HarnessError::validation(format!(
            "{what}: expected a conflict, but it succeeded with {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, SimulatedCompute};
    use crate::error::ErrorKind;

    fn catalogue() -> Vec<Scenario<SimulatedCompute>> {
        all_scenarios()
    }

    #[test]
    fn test_catalogue_names_unique_and_tagged() {
        let scenarios = catalogue();
        assert_eq!(scenarios.len(), 4);
        for s in &scenarios {
            assert!(s.has_tag(Tag::Smoke), "{} should be smoke", s.name);
            assert_eq!(s.services, &[Service::Network]);
        }
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_filter_by_tag_service_and_name() {
        let all = catalogue();

        assert_eq!(ScenarioFilter::default().apply(all.clone()).len(), 4);

        let slow = ScenarioFilter {
            tags: vec![Tag::Slow],
            ..Default::default()
        };
        let slow = slow.apply(all.clone());
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].name, "server_security_groups");

        let compute_only = ScenarioFilter {
            services: vec![Service::Compute],
            ..Default::default()
        };
        assert!(compute_only.apply(all.clone()).is_empty());

        let by_name = ScenarioFilter {
            tags: vec![Tag::Smoke],
            services: vec![Service::Network],
            name_contains: Some("update".into()),
        };
        let selected = by_name.apply(all);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "update_security_groups");
    }

    #[test]
    fn test_missing_service() {
        let s = catalogue()[0];
        assert_eq!(s.missing_service(&[Service::Compute]), Some(Service::Network));
        assert_eq!(s.missing_service(&[Service::Network]), None);
    }

    #[test]
    fn test_check_helpers() {
        assert!(check(true, "fine").is_ok());
        assert_eq!(
            check(false, "broken").unwrap_err().kind(),
            ErrorKind::ValidationFailure
        );

        let err = check_eq(" a ", "a", "name").unwrap_err();
        assert_eq!(err.to_string(), "validation failed: name: expected \"a\", got \" a \"");
    }

    #[test]
    fn test_expect_conflict() {
        let conflict = HarnessError::conflict(
            "security group sg-1",
            &ApiError::status("delete_security_group", 400, "in use"),
        );
        assert!(expect_conflict::<()>(Err(conflict), "delete").is_ok());

        let unexpected = expect_conflict(Ok(()), "delete").unwrap_err();
        assert_eq!(unexpected.kind(), ErrorKind::ValidationFailure);

        let other = HarnessError::from(ApiError::status("delete_security_group", 500, "boom"));
        assert_eq!(
            expect_conflict::<()>(Err(other.clone()), "delete").unwrap_err(),
            other
        );
    }
}
