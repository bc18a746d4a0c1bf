//! Compute resource kinds and cleanup ordering
//!
//! Provides consistent cleanup priority across the guard executor and the
//! orphan sweeper. Resources must be deleted in dependency order or the
//! backend rejects the deletion.

/// Kinds of compute resources created by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum ResourceKind {
    /// Server instance (must be gone before its security groups can be deleted)
    #[strum(serialize = "server")]
    Server,
    /// Security group (depends on every referencing server being terminated)
    #[strum(serialize = "security_group")]
    SecurityGroup,
}

impl ResourceKind {
    /// Get cleanup priority (lower number = cleanup first)
    ///
    /// - 0: Delete servers and wait for termination
    /// - 1: Delete security groups
    ///
    /// A security group attached to an active server cannot be deleted, so
    /// servers always go first.
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::Server => 0,
            ResourceKind::SecurityGroup => 1,
        }
    }
}
