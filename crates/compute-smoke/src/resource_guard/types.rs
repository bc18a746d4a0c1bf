//! Core types for resource tracking and cleanup

use chrono::{DateTime, Utc};
use compute_smoke_common::ResourceKind;

/// Identifies a compute resource uniquely for tracking and cleanup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// Server instance (must be gone before its groups can be deleted)
    Server(String),
    /// Security group (depends on servers being terminated)
    SecurityGroup(String),
}

impl ResourceId {
    /// Kind of the underlying resource
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceId::Server(_) => ResourceKind::Server,
            ResourceId::SecurityGroup(_) => ResourceKind::SecurityGroup,
        }
    }

    /// Get cleanup priority (lower = cleanup first)
    pub fn cleanup_priority(&self) -> u8 {
        self.kind().cleanup_priority()
    }

    /// Backend identifier
    pub fn raw_id(&self) -> &str {
        match self {
            ResourceId::Server(id) | ResourceId::SecurityGroup(id) => id,
        }
    }

    /// Get a human-readable description for logging
    pub fn description(&self) -> String {
        match self {
            ResourceId::Server(id) => format!("server {}", id),
            ResourceId::SecurityGroup(id) => format!("security group {}", id),
        }
    }
}

/// Metadata about a tracked resource
#[derive(Debug, Clone)]
pub struct ResourceMeta {
    /// Scenario that created the resource
    pub scenario: String,
    /// Name the resource was created with
    pub name: String,
    /// When the resource was created
    pub created_at: DateTime<Utc>,
}

impl ResourceMeta {
    /// Create new metadata for a resource being created now
    pub fn new(scenario: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
