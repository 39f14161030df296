//! Component K: the fan-out synchronizer.
//!
//! Grounded on `original_source/pkg/sync/endpoint_syncer.go`'s
//! `EndpointSyncker.syncEndpoint`/`deleteFile`/`copyFile`: per target, filter
//! the inbound change list by its ignore predicate, re-stat the survivors to
//! guard against a race between aggregation and this round actually running,
//! then delete and copy concurrently.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use skasync_contracts::ClusterCli;
use skasync_model::{ChangeList, HostPath, ProgressSample, Tag};
use tokio::sync::mpsc;

use crate::archive::build_archive_bytes;
use crate::error::Result;
use crate::ignore::IgnorePredicate;
use crate::progress::ProgressMultiplexer;
use crate::registry::SharedRegistry;
use crate::target::Target;

/// Tunables for the fan-out synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Conservative budget (bytes) for one `rm -rf --` invocation's argv.
    /// Resolves spec.md §9 Open Question (a): the original never chunks,
    /// leaving very large delete batches exposed to `E2BIG`.
    pub rm_argv_budget_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rm_argv_budget_bytes: 128 * 1024,
        }
    }
}

/// One target's sync-round outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetSyncReport {
    pub deleted: usize,
    pub modified: usize,
}

impl TargetSyncReport {
    pub fn total(&self) -> usize {
        self.deleted + self.modified
    }
}

pub struct Synchronizer {
    workspace_root: PathBuf,
    cli: Arc<dyn ClusterCli>,
    registry: SharedRegistry,
    config: SyncConfig,
    progress: Option<Arc<ProgressMultiplexer>>,
}

impl Synchronizer {
    pub fn new(
        workspace_root: PathBuf,
        cli: Arc<dyn ClusterCli>,
        registry: SharedRegistry,
        config: SyncConfig,
        progress: Option<Arc<ProgressMultiplexer>>,
    ) -> Self {
        Self {
            workspace_root,
            cli,
            registry,
            config,
            progress,
        }
    }

    /// Run one sync round against every currently resolved target. Logs an
    /// idle marker when any target had a nonzero change count, mirroring the
    /// original's "Watching for changes..." println at the end of a round.
    pub async fn sync_round(&self, list: &ChangeList) -> BTreeMap<Tag, TargetSyncReport> {
        let targets = self.registry.targets().await;
        let reports = join_all(targets.iter().map(|target| self.sync_target(target, list))).await;

        let mut out = BTreeMap::new();
        let mut any_changed = false;
        for (target, report) in targets.into_iter().zip(reports) {
            if report.total() > 0 {
                any_changed = true;
            }
            out.insert(target.tag, report);
        }
        if any_changed {
            tracing::info!("watching for changes...");
        }
        out
    }

    /// Sync one named target directly, bypassing the rest of the registry —
    /// used by the HTTP control surface's `PUT /sync/in/pod` and the CLI's
    /// `sync in <tag> <paths>` one-shot invocation. Returns `None` if `tag`
    /// isn't currently a resolved target.
    pub async fn sync_target_by_tag(&self, tag: &Tag, list: &ChangeList) -> Option<TargetSyncReport> {
        let target = self.registry.find_by_tag(tag).await?;
        Some(self.sync_target(&target, list).await)
    }

    async fn sync_target(&self, target: &Target, list: &ChangeList) -> TargetSyncReport {
        let deleted = restat_filter(
            list.deleted().keys(),
            &target.artifact.ignore,
            &self.workspace_root,
            false,
        );
        let modified = restat_filter(
            list.modified_and_added().keys(),
            &target.artifact.ignore,
            &self.workspace_root,
            true,
        );

        let report = TargetSyncReport {
            deleted: deleted.len(),
            modified: modified.len(),
        };
        if report.total() == 0 {
            return report;
        }

        tracing::info!(
            tag = %target.tag,
            deleted = deleted.len(),
            modified = modified.len(),
            "syncing",
        );

        let (delete_result, put_result) =
            tokio::join!(self.delete(target, &deleted), self.put(target, &modified));
        if let Err(err) = delete_result {
            tracing::warn!(tag = %target.tag, %err, "delete failed");
        }
        if let Err(err) = put_result {
            tracing::warn!(tag = %target.tag, %err, "copy failed");
        }

        if let Some(progress) = &self.progress {
            progress.clear(&target.tag).await;
        }

        report
    }

    async fn delete(&self, target: &Target, paths: &[HostPath]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let container_paths: Vec<String> = paths
            .iter()
            .map(|p| map_host_to_container(&target.container_root, p, true))
            .collect();

        for chunk in chunk_args(&container_paths, self.config.rm_argv_budget_bytes) {
            self.cli
                .exec_rm(&target.pod_name, &target.container, &chunk)
                .await?;
        }
        Ok(())
    }

    async fn put(&self, target: &Target, paths: &[HostPath]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut entries = BTreeMap::new();
        for p in paths {
            let abs = self.workspace_root.join(p.as_path());
            let dst = map_host_to_container(&target.container_root, p, false);
            entries.insert(abs, dst);
        }

        let progress_tx = match &self.progress {
            Some(mux) => {
                let (tx, mut rx) = mpsc::channel::<ProgressSample>(32);
                let mux = mux.clone();
                let tag = target.tag.clone();
                tokio::spawn(async move {
                    while let Some(sample) = rx.recv().await {
                        mux.set(tag.clone(), sample).await;
                    }
                });
                Some(tx)
            }
            None => None,
        };

        let archive = build_archive_bytes(&entries, progress_tx).await?;
        self.cli
            .exec_tar_extract(&target.pod_name, &target.container, archive)
            .await?;
        Ok(())
    }
}

/// Filter a bucket's keys by the target's ignore predicate, then re-stat
/// each survivor and keep it only if the filesystem still agrees with the
/// bucket it came from — a second reconcile guarding against a race between
/// the gateway's debounce and this round actually running.
fn restat_filter<'a>(
    keys: impl Iterator<Item = &'a HostPath>,
    predicate: &IgnorePredicate,
    workspace_root: &Path,
    expect_exists: bool,
) -> Vec<HostPath> {
    keys.filter(|p| !predicate.is_ignored(p.as_path(), false))
        .filter(|p| {
            let abs = workspace_root.join(p.as_path());
            let exists = abs.symlink_metadata().is_ok();
            exists == expect_exists
        })
        .cloned()
        .collect()
}

/// Translate a workspace-relative path into its in-container counterpart,
/// mirroring `userFilePathToPodFilePath`: join the target's container root
/// with the relative path, then strip the leading `/` unless the caller
/// needs an absolute argument (`rm -rf` argv does; archive entry names
/// extracted under `-C /` don't).
fn map_host_to_container(container_root: &Path, rel: &HostPath, need_first_slash: bool) -> String {
    let root = container_root.to_string_lossy();
    let root_trimmed = root.trim_end_matches('/');
    let rel_slash = rel.to_slash_string();
    let mut joined = if root_trimmed.is_empty() {
        format!("/{rel_slash}")
    } else {
        format!("{root_trimmed}/{rel_slash}")
    };
    if !joined.starts_with('/') {
        joined = format!("/{joined}");
    }
    if !need_first_slash {
        joined = joined.trim_start_matches('/').to_owned();
    }
    joined
}

/// Chunk delete-path argv into batches so no single `rm -rf --` invocation
/// exceeds `budget_bytes` of combined argument length.
fn chunk_args(paths: &[String], budget_bytes: usize) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_len = 0usize;
    for path in paths {
        let len = path.len() + 1;
        if !current.is_empty() && current_len + len > budget_bytes {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += len;
        current.push(path.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_host_to_container_strips_leading_slash_by_default() {
        let rel = HostPath::new("src/main.rs");
        let abs = map_host_to_container(Path::new("/app"), &rel, true);
        assert_eq!(abs, "/app/src/main.rs");
        let rel_for_archive = map_host_to_container(Path::new("/app"), &rel, false);
        assert_eq!(rel_for_archive, "app/src/main.rs");
    }

    #[test]
    fn chunk_args_splits_on_budget() {
        let paths = vec!["/a/one".to_owned(), "/a/two".to_owned(), "/a/three".to_owned()];
        let chunks = chunk_args(&paths, 12);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }
}
