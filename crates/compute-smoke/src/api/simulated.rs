//! In-memory compute backend
//!
//! Mirrors the observable behaviour of the real security-group and server
//! endpoints closely enough for the harness scenarios:
//! - status codes match the REST API (200 create/update, 202 delete, ...)
//! - a group attached to a live server cannot be deleted (400)
//! - server status changes are asynchronous and only advance when the
//!   server is polled with `get_server`
//!
//! Failures can be injected per operation to exercise error paths, and
//! [`SimulatorQuirks`] make the backend misbehave in ways the scenarios are
//! expected to catch.

use super::error::ApiError;
use super::models::{
    ApiResponse, CreateServerRequest, RebootType, SecurityGroup, SecurityGroupRef, ServerInstance,
    ServerSummary,
};
use super::{ApiResult, ComputeApi};
use compute_smoke_common::ServerStatus;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Maximum length of a security group name or description
const MAX_FIELD_LEN: usize = 255;

/// Timing knobs for simulated asynchronous transitions
///
/// Counts are `get_server` observations, not wall-clock time, so tests stay
/// deterministic.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Polls before a new server goes BUILD -> ACTIVE
    pub build_polls: u32,
    /// Polls before a rebooting server returns to ACTIVE
    pub reboot_polls: u32,
    /// Polls before a deleted server disappears (404)
    pub delete_polls: u32,
    /// Tenant id stamped on created groups
    pub tenant_id: String,
    /// Deliberate deviations from the real API
    pub quirks: SimulatorQuirks,
}

/// Ways a broken backend can deviate from the REST contract
///
/// All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorQuirks {
    /// Strip surrounding whitespace from stored names and descriptions
    pub trim_names: bool,
    /// Answer updates with the new values but never store them
    pub drop_updates: bool,
    /// Accept deletion of groups attached to live servers
    pub delete_in_use_groups: bool,
    /// Keep listing groups after they are deleted
    pub list_deleted_groups: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            build_polls: 2,
            reboot_polls: 1,
            delete_polls: 2,
            tenant_id: "smoke-tenant".to_string(),
            quirks: SimulatorQuirks::default(),
        }
    }
}

#[derive(Debug)]
enum Pending {
    Become { status: ServerStatus, polls_left: u32 },
    Vanish { polls_left: u32 },
}

#[derive(Debug)]
struct SimServer {
    instance: ServerInstance,
    /// Attached group ids; `instance.security_groups` carries the names
    attached: BTreeSet<String>,
    pending: Option<Pending>,
    deleting: bool,
}

impl SimServer {
    /// Whether this server still pins its security groups
    fn holds_groups(&self) -> bool {
        !self.instance.status.is_terminal()
    }
}

#[derive(Debug, Default)]
struct SimState {
    groups: BTreeMap<String, SecurityGroup>,
    /// Deleted groups still shown by listings (`list_deleted_groups`)
    ghost_groups: Vec<SecurityGroup>,
    servers: BTreeMap<String, SimServer>,
    faults: HashMap<&'static str, VecDeque<ApiError>>,
}

impl SimState {
    fn take_fault(&mut self, operation: &'static str) -> Option<ApiError> {
        self.faults.get_mut(operation).and_then(VecDeque::pop_front)
    }

    fn group_name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        self.groups
            .values()
            .any(|g| g.name == name && Some(g.id.as_str()) != except_id)
    }

    fn group_in_use(&self, group_id: &str) -> bool {
        self.servers
            .values()
            .any(|s| s.holds_groups() && s.attached.contains(group_id))
    }
}

/// In-memory [`ComputeApi`] implementation
#[derive(Debug, Default)]
pub struct SimulatedCompute {
    config: SimulatorConfig,
    state: Mutex<SimState>,
}

impl SimulatedCompute {
    /// Create a simulator with default timings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulator with custom timings
    pub fn with_config(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call to `operation` fail with `error`.
    ///
    /// Faults queue up: injecting twice fails the next two calls.
    pub fn inject_fault(&self, operation: &'static str, error: ApiError) {
        self.state()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Force a server into a status, dropping any pending transition
    pub fn set_server_status(&self, server_id: &str, status: ServerStatus) -> bool {
        let mut st = self.state();
        match st.servers.get_mut(server_id) {
            Some(server) => {
                server.instance.status = status;
                server.pending = None;
                true
            }
            None => false,
        }
    }

    /// Ids of all security groups currently stored
    pub fn security_group_ids(&self) -> Vec<String> {
        self.state().groups.keys().cloned().collect()
    }

    /// Ids of all servers still visible (including ones being deleted)
    pub fn server_ids(&self) -> Vec<String> {
        self.state().servers.keys().cloned().collect()
    }

    /// Number of stored security groups
    pub fn security_group_count(&self) -> usize {
        self.state().groups.len()
    }

    /// Number of visible servers
    pub fn server_count(&self) -> usize {
        self.state().servers.len()
    }

    fn validate_group_fields(
        operation: &'static str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), ApiError> {
        if let Some(name) = name {
            if name.is_empty() {
                return Err(ApiError::status(operation, 400, "Security group name is required"));
            }
            if name.len() > MAX_FIELD_LEN {
                return Err(ApiError::status(
                    operation,
                    400,
                    format!("Security group name exceeds {MAX_FIELD_LEN} characters"),
                ));
            }
        }
        if let Some(description) = description {
            if description.len() > MAX_FIELD_LEN {
                return Err(ApiError::status(
                    operation,
                    400,
                    format!("Security group description exceeds {MAX_FIELD_LEN} characters"),
                ));
            }
        }
        Ok(())
    }

    fn server_not_found(operation: &'static str, id: &str) -> ApiError {
        ApiError::status(operation, 404, format!("Instance {id} could not be found."))
    }

    fn group_not_found(operation: &'static str, id: &str) -> ApiError {
        ApiError::status(operation, 404, format!("Security group {id} not found."))
    }
}

impl ComputeApi for SimulatedCompute {
    async fn create_security_group(&self, name: &str, description: &str) -> ApiResult<SecurityGroup> {
        const OP: &str = "create_security_group";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        Self::validate_group_fields(OP, Some(name), Some(description))?;
        if st.group_name_taken(name, None) {
            return Err(ApiError::status(
                OP,
                400,
                format!("Security group {name} already exists"),
            ));
        }

        let (name, description) = if self.config.quirks.trim_names {
            (name.trim(), description.trim())
        } else {
            (name, description)
        };
        let group = SecurityGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tenant_id: Some(self.config.tenant_id.clone()),
            rules: Vec::new(),
        };
        debug!(sg_id = %group.id, name = ?group.name, "Simulator created security group");
        st.groups.insert(group.id.clone(), group.clone());
        Ok(ApiResponse::new(200, group))
    }

    async fn list_security_groups(&self) -> ApiResult<Vec<SecurityGroup>> {
        let mut st = self.state();
        if let Some(err) = st.take_fault("list_security_groups") {
            return Err(err);
        }
        let groups = st
            .groups
            .values()
            .chain(&st.ghost_groups)
            .cloned()
            .collect();
        Ok(ApiResponse::new(200, groups))
    }

    async fn get_security_group(&self, id: &str) -> ApiResult<SecurityGroup> {
        const OP: &str = "get_security_group";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        st.groups
            .get(id)
            .cloned()
            .map(|g| ApiResponse::new(200, g))
            .ok_or_else(|| Self::group_not_found(OP, id))
    }

    async fn update_security_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<SecurityGroup> {
        const OP: &str = "update_security_group";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        if !st.groups.contains_key(id) {
            return Err(Self::group_not_found(OP, id));
        }
        Self::validate_group_fields(OP, name, description)?;
        if let Some(name) = name {
            if st.group_name_taken(name, Some(id)) {
                return Err(ApiError::status(
                    OP,
                    400,
                    format!("Security group {name} already exists"),
                ));
            }
        }

        if self.config.quirks.drop_updates {
            let Some(mut echoed) = st.groups.get(id).cloned() else {
                return Err(Self::group_not_found(OP, id));
            };
            if let Some(name) = name {
                echoed.name = name.to_string();
            }
            if let Some(description) = description {
                echoed.description = description.to_string();
            }
            return Ok(ApiResponse::new(200, echoed));
        }

        let old_name = st.groups.get(id).map(|g| g.name.clone());
        let Some(group) = st.groups.get_mut(id) else {
            return Err(Self::group_not_found(OP, id));
        };
        if let Some(name) = name {
            group.name = name.to_string();
        }
        if let Some(description) = description {
            group.description = description.to_string();
        }
        let updated = group.clone();

        // Attached servers report groups by name, so follow the rename
        if let (Some(old), Some(new)) = (old_name, name) {
            for server in st.servers.values_mut() {
                if server.attached.contains(id) {
                    for group_ref in &mut server.instance.security_groups {
                        if group_ref.name == old {
                            group_ref.name = new.to_string();
                        }
                    }
                }
            }
        }
        Ok(ApiResponse::new(200, updated))
    }

    async fn delete_security_group(&self, id: &str) -> ApiResult<()> {
        const OP: &str = "delete_security_group";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        if !st.groups.contains_key(id) {
            return Err(Self::group_not_found(OP, id));
        }
        if st.group_in_use(id) && !self.config.quirks.delete_in_use_groups {
            return Err(ApiError::status(OP, 400, "Security group is still in use"));
        }
        if let Some(group) = st.groups.remove(id) {
            if self.config.quirks.list_deleted_groups {
                st.ghost_groups.push(group);
            }
        }
        debug!(sg_id = %id, "Simulator deleted security group");
        Ok(ApiResponse::new(202, ()))
    }

    async fn add_security_group(&self, server_id: &str, group_name: &str) -> ApiResult<()> {
        const OP: &str = "add_security_group";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        let Some(group_id) = st
            .groups
            .values()
            .find(|g| g.name == group_name)
            .map(|g| g.id.clone())
        else {
            return Err(ApiError::status(
                OP,
                404,
                format!("Security group {group_name} not found."),
            ));
        };
        let Some(server) = st.servers.get_mut(server_id) else {
            return Err(Self::server_not_found(OP, server_id));
        };
        if server.deleting || server.instance.status.is_terminal() {
            return Err(ApiError::status(
                OP,
                409,
                "Cannot 'addSecurityGroup' instance while it is in task_state deleting",
            ));
        }
        if server.instance.status == ServerStatus::Build {
            return Err(ApiError::status(
                OP,
                409,
                "Cannot 'addSecurityGroup' instance while it is in vm_state building",
            ));
        }
        if !server.attached.insert(group_id) {
            return Err(ApiError::status(
                OP,
                400,
                format!("Security group {group_name} is already associated with the instance"),
            ));
        }
        server.instance.security_groups.push(SecurityGroupRef {
            name: group_name.to_string(),
        });
        Ok(ApiResponse::new(202, ()))
    }

    async fn create_server(&self, request: &CreateServerRequest) -> ApiResult<ServerInstance> {
        const OP: &str = "create_server";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        if request.name.is_empty() {
            return Err(ApiError::status(OP, 400, "Server name is required"));
        }

        let instance = ServerInstance {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            status: ServerStatus::Build,
            security_groups: Vec::new(),
        };
        let mut server = SimServer {
            instance: instance.clone(),
            attached: BTreeSet::new(),
            pending: Some(Pending::Become {
                status: ServerStatus::Active,
                polls_left: self.config.build_polls,
            }),
            deleting: false,
        };
        if self.config.build_polls == 0 {
            server.instance.status = ServerStatus::Active;
            server.pending = None;
        }
        debug!(server_id = %instance.id, "Simulator booted server");
        st.servers.insert(instance.id.clone(), server);
        Ok(ApiResponse::new(202, instance))
    }

    async fn get_server(&self, id: &str) -> ApiResult<ServerInstance> {
        const OP: &str = "get_server";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        let Some(server) = st.servers.get_mut(id) else {
            return Err(Self::server_not_found(OP, id));
        };

        match server.pending.take() {
            Some(Pending::Become { status, polls_left }) if polls_left <= 1 => {
                server.instance.status = status;
            }
            Some(Pending::Become { status, polls_left }) => {
                server.pending = Some(Pending::Become {
                    status,
                    polls_left: polls_left - 1,
                });
            }
            Some(Pending::Vanish { polls_left }) if polls_left <= 1 => {
                st.servers.remove(id);
                debug!(server_id = %id, "Simulator reaped deleted server");
                return Err(Self::server_not_found(OP, id));
            }
            Some(Pending::Vanish { polls_left }) => {
                server.pending = Some(Pending::Vanish {
                    polls_left: polls_left - 1,
                });
            }
            None => {}
        }
        Ok(ApiResponse::new(200, server.instance.clone()))
    }

    async fn list_servers(&self) -> ApiResult<Vec<ServerSummary>> {
        let mut st = self.state();
        if let Some(err) = st.take_fault("list_servers") {
            return Err(err);
        }
        let servers = st
            .servers
            .values()
            .map(|s| ServerSummary {
                id: s.instance.id.clone(),
                name: s.instance.name.clone(),
            })
            .collect();
        Ok(ApiResponse::new(200, servers))
    }

    async fn reboot_server(&self, id: &str, reboot_type: RebootType) -> ApiResult<()> {
        const OP: &str = "reboot_server";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        let Some(server) = st.servers.get_mut(id) else {
            return Err(Self::server_not_found(OP, id));
        };
        if server.deleting || server.instance.status != ServerStatus::Active {
            return Err(ApiError::status(
                OP,
                409,
                format!(
                    "Cannot 'reboot' instance {id} while it is in status {}",
                    server.instance.status
                ),
            ));
        }

        server.instance.status = match reboot_type {
            RebootType::Hard => ServerStatus::HardReboot,
            RebootType::Soft => ServerStatus::Reboot,
        };
        server.pending = Some(Pending::Become {
            status: ServerStatus::Active,
            polls_left: self.config.reboot_polls,
        });
        if self.config.reboot_polls == 0 {
            server.instance.status = ServerStatus::Active;
            server.pending = None;
        }
        Ok(ApiResponse::new(202, ()))
    }

    async fn delete_server(&self, id: &str) -> ApiResult<()> {
        const OP: &str = "delete_server";
        let mut st = self.state();
        if let Some(err) = st.take_fault(OP) {
            return Err(err);
        }
        if !st.servers.contains_key(id) {
            return Err(Self::server_not_found(OP, id));
        }
        if self.config.delete_polls == 0 {
            st.servers.remove(id);
            return Ok(ApiResponse::new(204, ()));
        }
        if let Some(server) = st.servers.get_mut(id) {
            if !server.deleting {
                server.deleting = true;
                server.pending = Some(Pending::Vanish {
                    polls_left: self.config.delete_polls,
                });
            }
        }
        Ok(ApiResponse::new(204, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_request(name: &str) -> CreateServerRequest {
        CreateServerRequest::new(name, "image", "flavor")
    }

    async fn active_server(sim: &SimulatedCompute) -> String {
        let server = sim.create_server(&boot_request("srv")).await.unwrap().body;
        while sim.get_server(&server.id).await.unwrap().body.status != ServerStatus::Active {}
        server.id
    }

    #[tokio::test]
    async fn test_create_preserves_whitespace_in_name() {
        let sim = SimulatedCompute::new();
        let resp = sim
            .create_security_group("  padded name ", "desc")
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.name, "  padded name ");

        let fetched = sim.get_security_group(&resp.body.id).await.unwrap();
        assert_eq!(fetched.body, resp.body);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_and_duplicate_names() {
        let sim = SimulatedCompute::new();
        let err = sim.create_security_group("", "d").await.unwrap_err();
        assert_eq!(err.http_status(), Some(400));

        sim.create_security_group("dup", "d").await.unwrap();
        let err = sim.create_security_group("dup", "d").await.unwrap_err();
        assert_eq!(err.http_status(), Some(400));

        // Whitespace makes it a different name
        sim.create_security_group(" dup ", "d").await.unwrap();
    }

    #[tokio::test]
    async fn test_server_becomes_active_after_build_polls() {
        let sim = SimulatedCompute::with_config(SimulatorConfig {
            build_polls: 3,
            ..Default::default()
        });
        let created = sim.create_server(&boot_request("srv")).await.unwrap();
        assert_eq!(created.status, 202);
        assert_eq!(created.body.status, ServerStatus::Build);

        let id = created.body.id;
        assert_eq!(sim.get_server(&id).await.unwrap().body.status, ServerStatus::Build);
        assert_eq!(sim.get_server(&id).await.unwrap().body.status, ServerStatus::Build);
        assert_eq!(sim.get_server(&id).await.unwrap().body.status, ServerStatus::Active);
    }

    #[tokio::test]
    async fn test_attached_group_cannot_be_deleted_until_server_gone() {
        let sim = SimulatedCompute::new();
        let sg = sim.create_security_group("web", "d").await.unwrap().body;
        let server_id = active_server(&sim).await;

        let attach = sim.add_security_group(&server_id, "web").await.unwrap();
        assert_eq!(attach.status, 202);

        let err = sim.delete_security_group(&sg.id).await.unwrap_err();
        assert!(err.is_in_use());

        // Still pinned while the server is being deleted
        assert_eq!(sim.delete_server(&server_id).await.unwrap().status, 204);
        assert!(sim.delete_security_group(&sg.id).await.unwrap_err().is_in_use());

        while sim.get_server(&server_id).await.is_ok() {}
        assert_eq!(sim.delete_security_group(&sg.id).await.unwrap().status, 202);
        assert_eq!(sim.security_group_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_to_missing_or_deleting_server() {
        let sim = SimulatedCompute::new();
        sim.create_security_group("web", "d").await.unwrap();

        let err = sim.add_security_group("no-such-server", "web").await.unwrap_err();
        assert!(err.is_not_found());

        let server_id = active_server(&sim).await;
        sim.delete_server(&server_id).await.unwrap();
        let err = sim.add_security_group(&server_id, "web").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_reboot_requires_active() {
        let sim = SimulatedCompute::with_config(SimulatorConfig {
            reboot_polls: 1,
            ..Default::default()
        });
        let server = sim.create_server(&boot_request("srv")).await.unwrap().body;
        let err = sim.reboot_server(&server.id, RebootType::Hard).await.unwrap_err();
        assert!(err.is_conflict());

        let id = active_server(&sim).await;
        assert_eq!(sim.reboot_server(&id, RebootType::Hard).await.unwrap().status, 202);
        assert_eq!(sim.get_server(&id).await.unwrap().body.status, ServerStatus::Active);
    }

    #[tokio::test]
    async fn test_rename_follows_attachment() {
        let sim = SimulatedCompute::new();
        let sg = sim.create_security_group("old", "d").await.unwrap().body;
        let id = active_server(&sim).await;
        sim.add_security_group(&id, "old").await.unwrap();

        sim.update_security_group(&sg.id, Some("new"), None).await.unwrap();
        let server = sim.get_server(&id).await.unwrap().body;
        assert!(server.has_security_group("new"));
        assert!(!server.has_security_group("old"));
    }

    fn quirky(quirks: SimulatorQuirks) -> SimulatedCompute {
        SimulatedCompute::with_config(SimulatorConfig {
            quirks,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_trim_quirk_strips_whitespace() {
        let sim = quirky(SimulatorQuirks {
            trim_names: true,
            ..Default::default()
        });
        let group = sim.create_security_group(" padded ", " d ").await.unwrap().body;
        assert_eq!(group.name, "padded");
        assert_eq!(group.description, "d");
    }

    #[tokio::test]
    async fn test_drop_updates_quirk_echoes_without_storing() {
        let sim = quirky(SimulatorQuirks {
            drop_updates: true,
            ..Default::default()
        });
        let sg = sim.create_security_group("old", "d").await.unwrap().body;

        let echoed = sim
            .update_security_group(&sg.id, Some("new"), None)
            .await
            .unwrap();
        assert_eq!(echoed.body.name, "new");
        assert_eq!(sim.get_security_group(&sg.id).await.unwrap().body.name, "old");
    }

    #[tokio::test]
    async fn test_in_use_and_listing_quirks() {
        let sim = quirky(SimulatorQuirks {
            delete_in_use_groups: true,
            list_deleted_groups: true,
            ..Default::default()
        });
        let sg = sim.create_security_group("web", "d").await.unwrap().body;
        let server_id = active_server(&sim).await;
        sim.add_security_group(&server_id, "web").await.unwrap();

        assert_eq!(sim.delete_security_group(&sg.id).await.unwrap().status, 202);
        assert!(sim.get_security_group(&sg.id).await.unwrap_err().is_not_found());
        let listed = sim.list_security_groups().await.unwrap().body;
        assert!(listed.iter().any(|g| g.id == sg.id));
        assert_eq!(sim.security_group_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let sim = SimulatedCompute::new();
        sim.inject_fault(
            "list_security_groups",
            ApiError::Transport {
                operation: "list_security_groups",
                message: "connection reset".to_string(),
            },
        );
        assert!(sim.list_security_groups().await.unwrap_err().is_transport());
        assert_eq!(sim.list_security_groups().await.unwrap().status, 200);
    }
}
