//! Background cleanup executor for dropped resources

use super::registry::{CleanupMessage, ResourceRegistry};
use super::types::{ResourceId, ResourceMeta};
use crate::api::{ComputeApi, ignore_not_found};
use crate::error::HarnessError;
use crate::wait::{WaitConfig, wait_for_resource};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Item in the cleanup queue with priority
struct CleanupItem {
    resource: ResourceId,
    meta: ResourceMeta,
}

impl PartialEq for CleanupItem {
    fn eq(&self, other: &Self) -> bool {
        self.resource.cleanup_priority() == other.resource.cleanup_priority()
    }
}

impl Eq for CleanupItem {}

impl PartialOrd for CleanupItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CleanupItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order: lower priority number = higher priority = process first
        other
            .resource
            .cleanup_priority()
            .cmp(&self.resource.cleanup_priority())
    }
}

/// Outcome of cleaning up dropped resources
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Resources deleted by the executor
    pub deleted: Vec<String>,
    /// Resources the backend no longer knew about
    pub already_gone: Vec<String>,
    /// Resources that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
    /// Resources left on the backend in keep-resources mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kept: Vec<String>,
}

impl CleanupReport {
    /// Number of resources the executor handled
    pub fn total(&self) -> usize {
        self.deleted.len() + self.already_gone.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Cleaned {
    Deleted,
    AlreadyGone,
    /// Security group still attached to a live server; retried at shutdown
    InUse,
}

/// Background task that handles async cleanup of dropped resources
///
/// Resources are received via channel and cleaned up in dependency order:
/// servers are deleted and waited on before any security group. A group
/// dropped while a server it is attached to is still alive is held back and
/// retried after shutdown, once every queued server is gone.
pub struct CleanupExecutor<C> {
    api: Arc<C>,
    rx: mpsc::UnboundedReceiver<CleanupMessage>,
    termination: WaitConfig,
}

impl<C: ComputeApi> CleanupExecutor<C> {
    /// Create a new cleanup executor
    pub fn new(
        api: Arc<C>,
        rx: mpsc::UnboundedReceiver<CleanupMessage>,
        termination: WaitConfig,
    ) -> Self {
        Self {
            api,
            rx,
            termination,
        }
    }

    /// Run the cleanup executor (spawned as a background task)
    ///
    /// Processes cleanup messages until it receives a Shutdown message or the
    /// channel is closed, then finishes whatever is still queued.
    pub async fn run(mut self) -> CleanupReport {
        let mut pending: BinaryHeap<CleanupItem> = BinaryHeap::new();
        let mut deferred: Vec<CleanupItem> = Vec::new();
        let mut report = CleanupReport::default();

        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(CleanupMessage::ResourceDropped { resource, meta }) => {
                            debug!(resource = %resource.description(), "Queued for cleanup");
                            pending.push(CleanupItem { resource, meta });
                        }
                        Some(CleanupMessage::Shutdown) | None => {
                            debug!("Cleanup executor shutting down");
                            break;
                        }
                    }
                }
                // Process pending items when channel is quiet (batch processing)
                _ = tokio::time::sleep(Duration::from_millis(100)), if !pending.is_empty() => {
                    self.process_pending(&mut pending, &mut report, Some(&mut deferred)).await;
                }
            }
        }

        // Drops racing the shutdown request still get cleaned up
        while let Ok(CleanupMessage::ResourceDropped { resource, meta }) = self.rx.try_recv() {
            pending.push(CleanupItem { resource, meta });
        }

        if !deferred.is_empty() {
            info!(count = deferred.len(), "Retrying security groups that were still in use");
            pending.extend(deferred);
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Processing remaining cleanup items");
            self.process_pending(&mut pending, &mut report, None).await;
        }

        report
    }

    /// Drain `pending` in priority order
    ///
    /// With `deferred`, in-use security groups are parked there for the final
    /// pass. Without it (the final pass) they are retried until released.
    async fn process_pending(
        &self,
        pending: &mut BinaryHeap<CleanupItem>,
        report: &mut CleanupReport,
        mut deferred: Option<&mut Vec<CleanupItem>>,
    ) {
        while let Some(item) = pending.pop() {
            let description = item.resource.description();
            let final_pass = deferred.is_none();
            match self.cleanup_resource(&item.resource, final_pass).await {
                Ok(Cleaned::Deleted) => {
                    info!(
                        resource = %description,
                        scenario = %item.meta.scenario,
                        "Cleaned up dropped resource"
                    );
                    report.deleted.push(description);
                }
                Ok(Cleaned::AlreadyGone) => {
                    debug!(resource = %description, "Resource already deleted");
                    report.already_gone.push(description);
                }
                Ok(Cleaned::InUse) => match deferred.as_deref_mut() {
                    Some(deferred) => {
                        debug!(resource = %description, "Still in use, retrying at shutdown");
                        deferred.push(item);
                    }
                    None => report
                        .failed
                        .push((description, "security group is still in use".to_string())),
                },
                Err(e) => {
                    warn!(
                        resource = %description,
                        scenario = %item.meta.scenario,
                        error = %e,
                        "Failed to cleanup dropped resource"
                    );
                    report.failed.push((description, e.to_string()));
                }
            }
        }
    }

    async fn cleanup_resource(
        &self,
        resource: &ResourceId,
        final_pass: bool,
    ) -> Result<Cleaned, HarnessError> {
        match resource {
            ResourceId::Server(id) => {
                if ignore_not_found(self.api.delete_server(id).await)?.is_none() {
                    return Ok(Cleaned::AlreadyGone);
                }
                wait_for_server_gone(self.api.as_ref(), id, &self.termination).await?;
                Ok(Cleaned::Deleted)
            }
            ResourceId::SecurityGroup(id) if final_pass => self.delete_group_when_released(id).await,
            ResourceId::SecurityGroup(id) => match self.api.delete_security_group(id).await {
                Ok(_) => Ok(Cleaned::Deleted),
                Err(e) if e.is_not_found() => Ok(Cleaned::AlreadyGone),
                Err(e) if e.is_in_use() => Ok(Cleaned::InUse),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Keep retrying the delete while the group is in use
    ///
    /// Servers being torn down elsewhere can pin a group for a while; give up
    /// after the termination timeout.
    async fn delete_group_when_released(&self, id: &str) -> Result<Cleaned, HarnessError> {
        let already_gone = AtomicBool::new(false);
        wait_for_resource(
            &self.termination,
            || async {
                match self.api.delete_security_group(id).await {
                    Ok(_) => Ok(true),
                    Err(e) if e.is_not_found() => {
                        already_gone.store(true, atomic::Ordering::Relaxed);
                        Ok(true)
                    }
                    Err(e) if e.is_in_use() => Ok(false),
                    Err(e) => Err(HarnessError::from(e)),
                }
            },
            &format!("security group {id} release"),
        )
        .await?;

        if already_gone.load(atomic::Ordering::Relaxed) {
            Ok(Cleaned::AlreadyGone)
        } else {
            Ok(Cleaned::Deleted)
        }
    }
}

/// Poll until a server returns 404 or reports a terminal status
pub(crate) async fn wait_for_server_gone<C: ComputeApi>(
    api: &C,
    server_id: &str,
    config: &WaitConfig,
) -> Result<u32, HarnessError> {
    wait_for_resource(
        config,
        || async {
            match api.get_server(server_id).await {
                Ok(resp) => Ok(resp.body.status.is_terminal()),
                Err(e) if e.is_not_found() => Ok(true),
                Err(e) => Err(HarnessError::from(e)),
            }
        },
        &format!("server {server_id} termination"),
    )
    .await
}

/// Create a cleanup system: registry for guards plus the executor that
/// deletes whatever they drop
pub fn create_cleanup_system<C: ComputeApi>(
    api: Arc<C>,
    termination: WaitConfig,
) -> (ResourceRegistry, CleanupExecutor<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = ResourceRegistry::new(tx);
    let executor = CleanupExecutor::new(api, rx, termination);
    (registry, executor)
}
