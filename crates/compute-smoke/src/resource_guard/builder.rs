//! Builder for creating resource guards with proper metadata

use super::guard::{ResourceGuard, SecurityGroupGuard, ServerGuard};
use super::registry::ResourceRegistry;
use super::types::{ResourceId, ResourceMeta};
use crate::api::{SecurityGroup, ServerInstance};

/// Builder for creating resource guards with consistent metadata
///
/// Registering happens here, so a resource is tracked from the moment its
/// guard exists.
#[derive(Clone)]
pub struct ResourceGuardBuilder {
    registry: ResourceRegistry,
    scenario: String,
}

impl ResourceGuardBuilder {
    /// Create a new builder for resources created by `scenario`
    pub fn new(registry: ResourceRegistry, scenario: impl Into<String>) -> Self {
        Self {
            registry,
            scenario: scenario.into(),
        }
    }

    /// Get the scenario name
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Get the registry guards report to
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    fn guard<T>(&self, value: T, resource_id: ResourceId, name: &str) -> ResourceGuard<T> {
        self.registry.register(
            resource_id.clone(),
            ResourceMeta::new(self.scenario.clone(), name),
        );
        ResourceGuard::new(value, resource_id, self.registry.clone())
    }

    /// Track a newly created security group
    pub fn security_group(&self, group: SecurityGroup) -> SecurityGroupGuard {
        let id = ResourceId::SecurityGroup(group.id.clone());
        let name = group.name.clone();
        self.guard(group, id, &name)
    }

    /// Track a newly created server
    pub fn server(&self, server: ServerInstance) -> ServerGuard {
        let id = ResourceId::Server(server.id.clone());
        let name = server.name.clone();
        self.guard(server, id, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_smoke_common::ServerStatus;
    use tokio::sync::mpsc;

    fn group(id: &str) -> SecurityGroup {
        SecurityGroup {
            id: id.to_string(),
            name: format!("name-{id}"),
            description: String::new(),
            tenant_id: None,
            rules: Vec::new(),
        }
    }

    #[test]
    fn test_builder_registers_with_scenario() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry = ResourceRegistry::new(tx);
        let builder = ResourceGuardBuilder::new(registry.clone(), "create_list_delete");

        let guard = builder.security_group(group("sg-1"));
        let resources = registry.all_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].0, ResourceId::SecurityGroup("sg-1".into()));
        assert_eq!(resources[0].1.scenario, "create_list_delete");
        assert_eq!(resources[0].1.name, "name-sg-1");

        registry.release(guard.resource_id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_server_guard_derefs_to_instance() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let builder = ResourceGuardBuilder::new(ResourceRegistry::new(tx), "s");

        let guard = builder.server(ServerInstance {
            id: "srv-1".into(),
            name: "srv".into(),
            status: ServerStatus::Build,
            security_groups: Vec::new(),
        });
        assert_eq!(guard.status, ServerStatus::Build);
        assert_eq!(guard.resource_id(), &ResourceId::Server("srv-1".into()));
    }
}
