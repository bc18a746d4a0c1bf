//! compute-smoke-common - Shared types and constants
//!
//! Types shared by the harness library and the CLI, kept free
//! of HTTP and runtime dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default timeouts, poll intervals and naming values
//! - [`markers`]: Scenario tag and required-service markers
//! - [`resource_kind`]: Resource kinds and their cleanup ordering
//! - [`server_status`]: Canonical server lifecycle statuses

pub mod defaults;
pub mod markers;
pub mod resource_kind;
pub mod server_status;

pub use markers::{Service, Tag, parse_services};
pub use resource_kind::ResourceKind;
pub use server_status::ServerStatus;
