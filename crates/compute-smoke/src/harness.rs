//! Resource lifecycle harness
//!
//! Wraps a [`ComputeApi`] with the operations scenarios need: every create
//! returns a guard registered for cleanup, every delete deregisters and waits
//! for the backend to catch up, and every call checks the exact status code.

use crate::api::{
    ApiError, ApiResponse, ComputeApi, CreateServerRequest, RebootType, SecurityGroup,
    ServerInstance,
};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::naming::rand_name;
use crate::resource_guard::executor::wait_for_server_gone;
use crate::resource_guard::{ResourceGuardBuilder, ResourceId, SecurityGroupGuard, ServerGuard};
use crate::wait::wait_for_resource;
use compute_smoke_common::ServerStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Per-scenario orchestration over the compute client
pub struct Harness<C> {
    api: Arc<C>,
    config: HarnessConfig,
    guards: ResourceGuardBuilder,
}

/// Fail unless the backend answered with exactly `expected`
fn expect_status<T>(operation: &str, response: ApiResponse<T>, expected: u16) -> Result<T> {
    if response.status != expected {
        return Err(HarnessError::validation(format!(
            "{operation} returned HTTP {}, expected {expected}",
            response.status
        )));
    }
    Ok(response.body)
}

impl<C: ComputeApi> Harness<C> {
    pub fn new(api: Arc<C>, config: HarnessConfig, guards: ResourceGuardBuilder) -> Self {
        Self {
            api,
            config,
            guards,
        }
    }

    /// Direct access to the client, for calls the harness does not wrap
    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Name of the scenario this harness serves
    pub fn scenario(&self) -> &str {
        self.guards.scenario()
    }

    /// Number of resources still awaiting deletion
    pub fn tracked_resources(&self) -> usize {
        self.guards.registry().len()
    }

    /// Random name under the configured prefix
    pub fn rand_name(&self, base: &str) -> String {
        rand_name(&self.config.name_prefix, base)
    }

    /// Create a security group and track it for cleanup
    ///
    /// Missing name or description are generated. The group is tracked before
    /// the status is checked, so a bad status still gets it deleted.
    pub async fn create_security_group(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<SecurityGroupGuard> {
        let name = name.map_or_else(|| self.rand_name("securitygroup"), str::to_string);
        let description = description.map_or_else(|| self.rand_name("description"), str::to_string);

        let response = self.api.create_security_group(&name, &description).await?;
        let status = response.status;
        let guard = self.guards.security_group(response.body);
        expect_status("create_security_group", ApiResponse::new(status, ()), 200)?;

        info!(sg_id = %guard.id, name = ?guard.name, "Created security group");
        Ok(guard)
    }

    pub async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let response = self.api.list_security_groups().await?;
        expect_status("list_security_groups", response, 200)
    }

    pub async fn get_security_group(&self, id: &str) -> Result<SecurityGroup> {
        let response = self.api.get_security_group(id).await?;
        expect_status("get_security_group", response, 200)
    }

    pub async fn update_security_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<SecurityGroup> {
        let response = self.api.update_security_group(id, name, description).await?;
        expect_status("update_security_group", response, 200)
    }

    /// Delete a security group and wait until listings no longer show it
    ///
    /// A group still attached to a live server fails with
    /// [`HarnessError::Conflict`] and stays tracked.
    pub async fn delete_security_group(&self, id: &str) -> Result<()> {
        let response = match self.api.delete_security_group(id).await {
            Ok(response) => response,
            Err(e) if e.is_in_use() => {
                debug!(sg_id = %id, error = %e, "Security group deletion refused");
                return Err(HarnessError::conflict(format!("security group {id}"), &e));
            }
            Err(e) => return Err(e.into()),
        };

        // Accepted by the backend; no longer ours to clean up
        self.guards
            .registry()
            .release(&ResourceId::SecurityGroup(id.to_string()));
        expect_status("delete_security_group", response, 202)?;

        self.wait_for_security_group_deletion(id).await?;
        info!(sg_id = %id, "Deleted security group");
        Ok(())
    }

    /// Poll listings until the group id is absent
    pub async fn wait_for_security_group_deletion(&self, id: &str) -> Result<u32> {
        wait_for_resource(
            &self.config.waits.deletion(),
            || async {
                let groups = self.list_security_groups().await?;
                Ok(groups.iter().all(|g| g.id != id))
            },
            &format!("security group {id} deletion"),
        )
        .await
    }

    /// Attach a security group (by name) to a server
    ///
    /// A missing or terminated server yields [`HarnessError::Conflict`]. A 404
    /// for any other reason (an unknown group name) passes through.
    pub async fn attach_security_group(&self, server_id: &str, group_name: &str) -> Result<()> {
        let response = match self.api.add_security_group(server_id, group_name).await {
            Ok(response) => response,
            Err(e) => return Err(self.attach_error(server_id, e).await),
        };
        expect_status("add_security_group", response, 202)?;

        info!(server_id = %server_id, group = ?group_name, "Attached security group");
        Ok(())
    }

    /// Boot a server with the configured image and flavor
    pub async fn create_server(&self, name: Option<&str>) -> Result<ServerGuard> {
        let name = name.map_or_else(|| self.rand_name("server"), str::to_string);
        let request = CreateServerRequest::new(
            name,
            &self.config.server.image_ref,
            &self.config.server.flavor_ref,
        );

        let response = self.api.create_server(&request).await?;
        let status = response.status;
        let guard = self.guards.server(response.body);
        expect_status("create_server", ApiResponse::new(status, ()), 202)?;

        info!(server_id = %guard.id, name = %guard.name, "Created server");
        Ok(guard)
    }

    pub async fn reboot_server(&self, id: &str, reboot_type: RebootType) -> Result<()> {
        let response = self.api.reboot_server(id, reboot_type).await?;
        expect_status("reboot_server", response, 202)?;
        info!(server_id = %id, reboot_type = %reboot_type, "Rebooting server");
        Ok(())
    }

    /// Delete a server and wait for it to terminate
    pub async fn delete_server(&self, id: &str) -> Result<()> {
        let response = self.api.delete_server(id).await?;
        self.guards
            .registry()
            .release(&ResourceId::Server(id.to_string()));
        expect_status("delete_server", response, 204)?;

        self.wait_for_server_termination(id).await?;
        info!(server_id = %id, "Deleted server");
        Ok(())
    }

    /// Poll until the server returns 404 or reports a terminal status
    pub async fn wait_for_server_termination(&self, id: &str) -> Result<u32> {
        wait_for_server_gone(self.api.as_ref(), id, &self.config.waits.termination()).await
    }

    /// Poll until the server reaches `target`
    ///
    /// Uses the configured status timeout unless `timeout` is given. Entering
    /// ERROR while waiting for anything else fails at once.
    pub async fn wait_for_status(
        &self,
        server_id: &str,
        target: ServerStatus,
        timeout: Option<Duration>,
    ) -> Result<ServerInstance> {
        let mut config = self.config.waits.status();
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout);
        }

        let reached: Mutex<Option<ServerInstance>> = Mutex::new(None);
        let attempts = wait_for_resource(
            &config,
            || async {
                let server = self.api.get_server(server_id).await?.body;
                if server.status == target {
                    *reached.lock().unwrap_or_else(PoisonError::into_inner) = Some(server);
                    return Ok(true);
                }
                if server.status == ServerStatus::Error {
                    return Err(HarnessError::validation(format!(
                        "server {server_id} entered ERROR while waiting for {target}"
                    )));
                }
                debug!(server_id = %server_id, status = %server.status, target = %target, "Waiting for server status");
                Ok(false)
            },
            &format!("server {server_id} {target}"),
        )
        .await?;

        let server = reached
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or_else(|| {
                HarnessError::validation(format!("server {server_id} status was not recorded"))
            })?;
        debug!(server_id = %server_id, status = %target, attempts, "Server reached status");
        Ok(server)
    }

    /// Attaching to a server that is gone or going away is a conflict
    ///
    /// The attach endpoint answers 404 for a missing server and for a missing
    /// group alike, so a 404 is only blamed on the server once it is
    /// confirmed gone.
    async fn attach_error(&self, server_id: &str, error: ApiError) -> HarnessError {
        let server_gone = error.is_not_found()
            && matches!(self.api.get_server(server_id).await, Err(ref e) if e.is_not_found());
        if error.is_conflict() || server_gone {
            HarnessError::conflict(format!("server {server_id}"), &error)
        } else {
            error.into()
        }
    }
}
