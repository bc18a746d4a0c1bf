//! Thread-safe resource registry for tracking live compute resources

use super::types::{ResourceId, ResourceMeta};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Message sent to the cleanup executor when a resource needs cleanup
#[derive(Debug)]
pub enum CleanupMessage {
    /// A resource went out of scope while still tracked - needs cleanup
    ResourceDropped {
        resource: ResourceId,
        meta: ResourceMeta,
    },
    /// Request the executor to finish pending work and stop
    Shutdown,
}

/// Thread-safe registry of live resources the harness still owns
///
/// Resources are registered immediately upon creation and released when the
/// scenario deletes them explicitly. Anything still registered when its guard
/// goes out of scope is sent to the cleanup executor.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Currently tracked resources (created, not yet deleted)
    resources: Mutex<HashMap<ResourceId, ResourceMeta>>,
    /// Channel to send cleanup requests to the executor
    cleanup_tx: mpsc::UnboundedSender<CleanupMessage>,
    /// Keep-resources mode: drops leave resources tracked and on the backend
    keep: AtomicBool,
}

impl ResourceRegistry {
    /// Create a new registry with a cleanup channel
    pub fn new(cleanup_tx: mpsc::UnboundedSender<CleanupMessage>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                resources: Mutex::new(HashMap::new()),
                cleanup_tx,
                keep: AtomicBool::new(false),
            }),
        }
    }

    fn resources(&self) -> MutexGuard<'_, HashMap<ResourceId, ResourceMeta>> {
        self.inner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a resource for tracking
    ///
    /// Call this right after the backend confirms creation, before any
    /// assertion that could abort the scenario.
    pub fn register(&self, resource: ResourceId, meta: ResourceMeta) {
        self.resources().insert(resource, meta);
    }

    /// Stop tracking a resource without triggering cleanup
    ///
    /// Called after the resource was deleted explicitly. Returns the metadata
    /// if the resource was tracked.
    pub fn release(&self, resource: &ResourceId) -> Option<ResourceMeta> {
        self.resources().remove(resource)
    }

    /// Check whether a resource is still tracked
    pub fn is_tracked(&self, resource: &ResourceId) -> bool {
        self.resources().contains_key(resource)
    }

    /// Switch keep-resources mode on or off
    ///
    /// While on, dropped guards queue nothing and their resources stay in
    /// [`all_resources`](Self::all_resources) for the caller to report.
    pub fn set_keep_resources(&self, keep: bool) {
        self.inner.keep.store(keep, Ordering::Relaxed);
    }

    pub fn keeps_resources(&self) -> bool {
        self.inner.keep.load(Ordering::Relaxed)
    }

    /// Called when a guard goes out of scope
    ///
    /// If the resource is still tracked it is removed and sent to the cleanup
    /// executor. Returns whether a cleanup request was queued.
    pub fn on_drop(&self, resource: &ResourceId) -> bool {
        if self.keeps_resources() {
            return false;
        }
        let Some(meta) = self.release(resource) else {
            return false;
        };

        // Executor may already be gone; nothing else can be done from Drop
        let _ = self.inner.cleanup_tx.send(CleanupMessage::ResourceDropped {
            resource: resource.clone(),
            meta,
        });
        true
    }

    /// Get all currently tracked resources
    pub fn all_resources(&self) -> Vec<(ResourceId, ResourceMeta)> {
        self.resources()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get the count of currently tracked resources
    pub fn len(&self) -> usize {
        self.resources().len()
    }

    /// Check if there are no tracked resources
    pub fn is_empty(&self) -> bool {
        self.resources().is_empty()
    }

    /// Queue every still-tracked resource for cleanup
    ///
    /// Safety net for resources whose guards were leaked rather than dropped.
    /// Returns how many were queued.
    pub fn flush(&self) -> usize {
        let drained: Vec<_> = self.resources().drain().collect();
        let count = drained.len();
        for (resource, meta) in drained {
            let _ = self
                .inner
                .cleanup_tx
                .send(CleanupMessage::ResourceDropped { resource, meta });
        }
        count
    }

    /// Request the cleanup executor to shut down
    pub fn shutdown(&self) {
        let _ = self.inner.cleanup_tx.send(CleanupMessage::Shutdown);
    }
}
