//! Name-based orphan cleanup
//!
//! Finds resources left behind by runs that crashed before their cleanup
//! executor could finish, by matching the harness name prefix, and deletes
//! them in dependency order.

use crate::api::{ComputeApi, ignore_not_found};
use crate::error::Result;
use crate::resource_guard::executor::wait_for_server_gone;
use crate::wait::WaitConfig;
use compute_smoke_common::ResourceKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sweep configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Resources whose name starts with this prefix are considered orphans
    pub prefix: String,
    /// Report only (false = actually delete)
    pub dry_run: bool,
}

/// A resource matched by the sweep
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanResource {
    #[serde(serialize_with = "serialize_kind")]
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

fn serialize_kind<S: serde::Serializer>(
    kind: &ResourceKind,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.as_ref())
}

/// Report of sweep operations
#[derive(Debug, Default, serde::Serialize)]
pub struct SweepReport {
    pub found: Vec<OrphanResource>,
    pub servers: usize,
    pub security_groups: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Prefix-based orphan sweeper
pub struct OrphanSweeper<C> {
    api: Arc<C>,
    termination: WaitConfig,
}

/// Whitespace-padded names still belong to the harness
fn is_orphan(name: &str, prefix: &str) -> bool {
    !prefix.is_empty() && name.trim().starts_with(prefix)
}

impl<C: ComputeApi> OrphanSweeper<C> {
    pub fn new(api: Arc<C>, termination: WaitConfig) -> Self {
        Self { api, termination }
    }

    /// List resources under the prefix
    pub async fn scan(&self, prefix: &str) -> Result<Vec<OrphanResource>> {
        let servers = self.api.list_servers().await?.body;
        let groups = self.api.list_security_groups().await?.body;

        let mut found: Vec<OrphanResource> = servers
            .into_iter()
            .filter(|s| is_orphan(&s.name, prefix))
            .map(|s| OrphanResource {
                kind: ResourceKind::Server,
                id: s.id,
                name: s.name,
            })
            .chain(
                groups
                    .into_iter()
                    .filter(|g| is_orphan(&g.name, prefix))
                    .map(|g| OrphanResource {
                        kind: ResourceKind::SecurityGroup,
                        id: g.id,
                        name: g.name,
                    }),
            )
            .collect();
        found.sort_by_key(|r| r.kind.cleanup_priority());
        Ok(found)
    }

    /// Scan and optionally delete orphaned resources
    pub async fn sweep(&self, config: &SweepConfig) -> Result<SweepReport> {
        info!(
            prefix = %config.prefix,
            dry_run = config.dry_run,
            "Scanning for orphaned resources"
        );

        let found = self.scan(&config.prefix).await?;
        let mut report = SweepReport::default();

        if found.is_empty() {
            info!("No orphaned resources found");
            return Ok(report);
        }
        info!(count = found.len(), "Found orphaned resources");

        // Servers to wait on before any group delete
        let mut terminating: Vec<&str> = Vec::new();
        let mut waited = false;

        for resource in &found {
            match resource.kind {
                ResourceKind::Server => report.servers += 1,
                ResourceKind::SecurityGroup => report.security_groups += 1,
            }

            if config.dry_run {
                info!(
                    kind = %resource.kind,
                    id = %resource.id,
                    name = ?resource.name,
                    "[DRY RUN] Would delete"
                );
                report.skipped += 1;
                continue;
            }

            if resource.kind == ResourceKind::SecurityGroup && !waited {
                waited = true;
                for server_id in &terminating {
                    if let Err(e) =
                        wait_for_server_gone(self.api.as_ref(), server_id, &self.termination).await
                    {
                        warn!(server_id = %server_id, error = %e, "Server did not terminate");
                    }
                }
            }

            match self.delete(resource).await {
                Ok(()) => {
                    info!(kind = %resource.kind, id = %resource.id, "Deleted");
                    if resource.kind == ResourceKind::Server {
                        terminating.push(&resource.id);
                    }
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(
                        kind = %resource.kind,
                        id = %resource.id,
                        error = %e,
                        "Failed to delete"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            found = found.len(),
            deleted = report.deleted,
            failed = report.failed,
            skipped = report.skipped,
            "Orphan sweep complete"
        );
        report.found = found;
        Ok(report)
    }

    async fn delete(&self, resource: &OrphanResource) -> Result<()> {
        let outcome = match resource.kind {
            ResourceKind::Server => ignore_not_found(self.api.delete_server(&resource.id).await)?,
            ResourceKind::SecurityGroup => {
                ignore_not_found(self.api.delete_security_group(&resource.id).await)?
            }
        };
        if outcome.is_none() {
            debug!(id = %resource.id, "Already deleted");
        }
        Ok(())
    }
}
