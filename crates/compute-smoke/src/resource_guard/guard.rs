//! RAII guard for compute resources

use super::registry::ResourceRegistry;
use super::types::ResourceId;
use crate::api::{SecurityGroup, ServerInstance};
use std::ops::Deref;

/// RAII guard that tracks a compute resource
///
/// While the resource is registered, dropping the guard sends it to the
/// cleanup executor. Deleting the resource through the harness releases it
/// from the registry, after which the drop is a no-op.
///
/// # Example
///
/// ```ignore
/// let group = harness.create_security_group(None, None).await?;
///
/// // If the scenario fails here, the group is deleted by the executor
/// check_eq(&fetched, &*group, "fetched group")?;
///
/// // Explicit delete releases tracking; nothing is queued on drop
/// harness.delete_security_group(&group.id).await?;
/// ```
#[must_use = "dropping a guard immediately queues the resource for cleanup"]
pub struct ResourceGuard<T> {
    /// The wrapped value as returned by the backend
    value: T,
    handle: TrackedHandle,
}

/// Tracking half of a guard; owns the drop behaviour
struct TrackedHandle {
    resource_id: ResourceId,
    registry: ResourceRegistry,
}

impl Drop for TrackedHandle {
    fn drop(&mut self) {
        if self.registry.on_drop(&self.resource_id) {
            tracing::debug!(
                resource = %self.resource_id.description(),
                "Guard dropped, queued for cleanup"
            );
        }
    }
}

impl<T> ResourceGuard<T> {
    /// Create a new guard (internal - use `ResourceGuardBuilder`)
    ///
    /// The resource must already be registered.
    pub(crate) fn new(value: T, resource_id: ResourceId, registry: ResourceRegistry) -> Self {
        Self {
            value,
            handle: TrackedHandle {
                resource_id,
                registry,
            },
        }
    }

    /// Get the inner value without consuming
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Get the resource ID
    pub fn resource_id(&self) -> &ResourceId {
        &self.handle.resource_id
    }

    /// Whether the resource still awaits deletion
    pub fn is_tracked(&self) -> bool {
        self.handle.registry.is_tracked(&self.handle.resource_id)
    }
}

impl<T> Deref for ResourceGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ResourceGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("value", &self.value)
            .field("resource_id", &self.handle.resource_id)
            .finish()
    }
}

/// Guard for a security group
pub type SecurityGroupGuard = ResourceGuard<SecurityGroup>;

/// Guard for a server instance
pub type ServerGuard = ResourceGuard<ServerInstance>;
