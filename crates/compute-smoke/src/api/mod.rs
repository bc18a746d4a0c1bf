//! Compute API client capability
//!
//! The harness never talks HTTP directly. It drives a [`ComputeApi`], which has
//! two implementations:
//! - [`HttpComputeClient`]: thin adapter over the compute REST endpoints
//! - [`SimulatedCompute`]: in-memory backend used by tests and `--backend sim`

pub mod error;
pub mod http;
pub mod models;
pub mod simulated;

pub use error::{ApiError, ignore_not_found};
pub use http::HttpComputeClient;
pub use models::{
    ApiResponse, CreateServerRequest, RebootType, SecurityGroup, SecurityGroupRef, ServerInstance,
    ServerSummary,
};
pub use simulated::{SimulatedCompute, SimulatorConfig, SimulatorQuirks};

use std::future::Future;

/// Result of a single client call
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Security-group and server operations the harness depends on.
///
/// Every call yields the backend's status code with the decoded body on
/// success; non-2xx answers surface as [`ApiError::Status`]. Implementations
/// must not retry and must not alter names or descriptions in transit.
pub trait ComputeApi: Send + Sync {
    /// Create a security group
    fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> impl Future<Output = ApiResult<SecurityGroup>> + Send;

    /// List security groups visible to the caller
    fn list_security_groups(&self) -> impl Future<Output = ApiResult<Vec<SecurityGroup>>> + Send;

    /// Fetch one security group by id
    fn get_security_group(&self, id: &str)
    -> impl Future<Output = ApiResult<SecurityGroup>> + Send;

    /// Update name and/or description
    fn update_security_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> impl Future<Output = ApiResult<SecurityGroup>> + Send;

    /// Delete a security group
    fn delete_security_group(&self, id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Attach a security group (by name) to a server
    fn add_security_group(
        &self,
        server_id: &str,
        group_name: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Boot a server
    fn create_server(
        &self,
        request: &CreateServerRequest,
    ) -> impl Future<Output = ApiResult<ServerInstance>> + Send;

    /// Fetch one server by id
    fn get_server(&self, id: &str) -> impl Future<Output = ApiResult<ServerInstance>> + Send;

    /// List servers visible to the caller
    fn list_servers(&self) -> impl Future<Output = ApiResult<Vec<ServerSummary>>> + Send;

    /// Reboot a server
    fn reboot_server(
        &self,
        id: &str,
        reboot_type: RebootType,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Delete a server
    fn delete_server(&self, id: &str) -> impl Future<Output = ApiResult<()>> + Send;
}
