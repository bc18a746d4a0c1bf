//! RAII-style resource guards for compute resource cleanup
//!
//! Every resource a scenario creates is registered the moment the backend
//! confirms it. Explicit deletes release it; anything still registered when
//! its guard drops (early return, failed assertion, panic) is deleted by a
//! background executor in dependency order.

pub mod builder;
pub mod executor;
pub mod guard;
pub mod registry;
pub mod types;

pub use builder::ResourceGuardBuilder;
pub use executor::{CleanupExecutor, CleanupReport, create_cleanup_system};
pub use guard::{ResourceGuard, SecurityGroupGuard, ServerGuard};
pub use registry::{CleanupMessage, ResourceRegistry};
pub use types::{ResourceId, ResourceMeta};
