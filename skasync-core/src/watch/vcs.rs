//! Component F: the VCS-HEAD monitor.
//!
//! Grounded on `original_source/pkg/git/checkout_mon.go` and
//! `pkg/git/reader.go`: watch `.git/HEAD` for writes, and when its target
//! changes, shell out to `git diff --name-status` between the old and new
//! ref to learn which paths moved. Opt-in, enabled only when
//! `Config.vcs_root_dir` is set (spec.md §4.F).

use std::path::{Path, PathBuf};

use notify::{RecursiveMode, Watcher as _};
use skasync_model::{ChangeList, HostPath};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};

fn head_path(root: &Path) -> PathBuf {
    root.join(".git").join("HEAD")
}

/// Whether `root` looks like a git checkout worth monitoring.
pub fn has_git_head(root: &Path) -> bool {
    head_path(root).exists()
}

async fn read_head(root: &Path) -> Option<String> {
    let data = tokio::fs::read_to_string(head_path(root)).await.ok()?;
    let trimmed = data.trim_end_matches('\n');
    if let Some(ref_name) = trimmed.strip_prefix("ref: ") {
        Some(ref_name.to_owned())
    } else if !trimmed.is_empty() {
        Some(trimmed.to_owned())
    } else {
        None
    }
}

/// Watch `root`'s `.git/HEAD` for checkouts (branch switches, resets,
/// pulls), emitting a [`ChangeList`] built from `git diff --name-status`
/// between the pre- and post-checkout HEAD for every one observed.
pub async fn watch_vcs(
    root: &Path,
    out: mpsc::Sender<ChangeList>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut current_head = read_head(root)
        .await
        .ok_or_else(|| SyncError::GitHeadMissing { root: root.to_path_buf() })?;

    let (raw_tx, mut raw_rx) = mpsc::channel::<()>(8);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = raw_tx.try_send(());
        }
    })
    .map_err(|err| SyncError::Io(std::io::Error::other(err)))?;
    watcher
        .watch(&head_path(root), RecursiveMode::NonRecursive)
        .map_err(|err| SyncError::Io(std::io::Error::other(err)))?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = raw_rx.recv() => {
                if event.is_none() {
                    break;
                }
                let Some(new_head) = read_head(root).await else { continue };
                if new_head == current_head {
                    continue;
                }

                let list = diff_change_list(root, &current_head, &new_head).await?;
                current_head = new_head;
                if !list.is_empty() && out.send(list).await.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Run `git diff --name-status old new` and turn the output into a
/// [`ChangeList`], re-stating every reported path against the working tree
/// rather than trusting git's A/M label directly — the working tree is the
/// ground truth for what a sync round should pick up, and this keeps the
/// classification logic identical to the filesystem watcher's.
async fn diff_change_list(root: &Path, old_head: &str, new_head: &str) -> Result<ChangeList> {
    let output = Command::new("git")
        .arg("diff")
        .arg("--name-status")
        .arg(old_head)
        .arg(new_head)
        .current_dir(root)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut list = ChangeList::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(2, '\t');
        let (Some(status), Some(rel)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !matches!(status, "A" | "M" | "D") {
            continue;
        }
        let key = HostPath::new(PathBuf::from(rel));
        let abs = root.join(rel);
        list.reconcile_at(&key, &abs);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_git_head_false_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_git_head(dir.path()));
    }
}
