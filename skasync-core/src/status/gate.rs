//! Component I: the status gate.
//!
//! Grounded on `original_source/pkg/sync/skaffold.go`'s
//! `SkaffoldStatusLayer`: while watching and the deploy isn't ready, touched
//! paths accumulate in a buffer instead of flowing straight through; on the
//! not-ready → ready edge the target registry is refreshed and the buffer
//! is flushed as one change list. When not watching (a one-shot `sync`
//! invocation), every change list passes through untouched.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;

use skasync_model::{ChangeList, DeployStatus, HostPath};

/// Holds the last known deploy status and the set of paths touched while
/// the deploy was not ready.
pub struct StatusGate {
    is_watching: bool,
    last_status: Mutex<DeployStatus>,
    buffer: Mutex<BTreeSet<HostPath>>,
}

impl StatusGate {
    pub fn new(is_watching: bool) -> Self {
        Self {
            is_watching,
            last_status: Mutex::new(DeployStatus::not_ready()),
            buffer: Mutex::new(BTreeSet::new()),
        }
    }

    /// Feed an incoming change list. Returns `Some(list)` to forward it to
    /// the synchronizer right away, or `None` when it was buffered instead
    /// (not watching mode never buffers; a one-shot `sync` always forwards).
    pub fn ingest(&self, list: ChangeList) -> Option<ChangeList> {
        let status = self.last_status.lock().unwrap();
        if !self.is_watching || status.ready {
            return Some(list);
        }
        let unreachable = status.unreachable;
        drop(status);

        let mut buffer = self.buffer.lock().unwrap();
        buffer.extend(list.modified_and_added().into_keys());
        buffer.extend(list.deleted().keys().cloned());
        let count = buffer.len();
        drop(buffer);

        if unreachable {
            tracing::info!(buffered = count, "deploy status feed unreachable, awaiting start");
        } else {
            tracing::info!(buffered = count, "awaiting deploy, change list buffered");
        }
        None
    }

    /// Record a fresh status observation. When the deploy transitions from
    /// not-ready to ready, `on_ready_transition` runs first (the target
    /// registry refresh) and then any buffered paths are reconciled against
    /// `root` and returned as one flush.
    pub async fn observe_status<F, Fut>(
        &self,
        new_status: DeployStatus,
        root: &Path,
        on_ready_transition: F,
    ) -> Option<ChangeList>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let (became_ready, became_not_ready) = {
            let mut status = self.last_status.lock().unwrap();
            let became_ready = !status.ready && new_status.ready;
            let became_not_ready = status.ready && !new_status.ready;
            *status = new_status;
            (became_ready, became_not_ready)
        };

        if became_not_ready {
            tracing::warn!("deploy is down");
        }
        if !became_ready {
            return None;
        }
        tracing::info!("deploy is up");
        on_ready_transition().await;

        let mut buffer = self.buffer.lock().unwrap();
        if buffer.is_empty() {
            return None;
        }
        tracing::info!(buffered = buffer.len(), "flushing buffered changes");
        let mut list = ChangeList::new();
        for path in buffer.iter() {
            list.reconcile_at(path, &root.join(path.as_path()));
        }
        buffer.clear();
        Some(list)
    }

    /// The last observed status, for callers that need to check readiness
    /// synchronously (e.g. the debug API).
    pub fn last_status(&self) -> DeployStatus {
        self.last_status.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skasync_model::FileInfo;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::SystemTime;

    fn sample_list() -> ChangeList {
        let mut list = ChangeList::new();
        list.add_modified(
            HostPath::new("a.txt"),
            FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644),
        );
        list
    }

    #[test]
    fn not_watching_never_buffers() {
        let gate = StatusGate::new(false);
        let result = gate.ingest(sample_list());
        assert!(result.is_some());
    }

    #[test]
    fn watching_and_not_ready_buffers() {
        let gate = StatusGate::new(true);
        let result = gate.ingest(sample_list());
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn ready_transition_triggers_refresh_and_flush() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let gate = StatusGate::new(true);
        gate.ingest(sample_list());

        let refreshed = AtomicBool::new(false);
        let mut ready_status = DeployStatus::not_ready();
        ready_status.deploy = "Complete".to_owned();
        ready_status.status_check = "Succeeded".to_owned();
        ready_status.recompute_ready();

        let flushed = gate
            .observe_status(ready_status, dir.path(), || async {
                refreshed.store(true, Ordering::SeqCst);
            })
            .await;

        assert!(refreshed.load(Ordering::SeqCst));
        assert!(flushed.is_some());
        assert_eq!(flushed.unwrap().modified().len(), 1);
    }
}
