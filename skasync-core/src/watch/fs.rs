//! Component E: the recursive filesystem watcher.
//!
//! Grounded on `original_source/pkg/filemon/watcher.go`'s `Watcher.Watch`:
//! a raw recursive watch feeding a reset-on-every-event timer, so a burst of
//! edits produces one change list after the burst goes quiet rather than one
//! per event. Ported onto the `notify` crate instead of `rjeczalik/notify`,
//! and onto `tokio::time::sleep`/`tokio_util::sync::CancellationToken` instead
//! of `time.Timer`/`context.Context`. This is hand-rolled rather than reused
//! from a fixed-tick batcher elsewhere, since it needs to match the
//! original's reset-on-every-event semantics exactly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use notify::{Event, RecursiveMode, Watcher as _};
use skasync_model::{ChangeList, HostPath};
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};

/// Watch `root` recursively, emitting one coalesced [`ChangeList`] on `out`
/// per debounce window. `debounce_ms` is the quiet period required after the
/// last observed event before a batch is flushed; it resets on every new
/// event, matching the original's `timer.Reset` rather than a fixed-interval
/// batcher.
pub async fn watch_fs(
    root: &Path,
    debounce_ms: u64,
    out: mpsc::Sender<ChangeList>,
    cancel: CancellationToken,
) -> Result<()> {
    let (raw_tx, mut raw_rx) = mpsc::channel::<PathBuf>(100);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in event.paths {
                if raw_tx.try_send(path).is_err() {
                    tracing::warn!("fs watch channel full, dropping event");
                }
            }
        }
        Err(err) => tracing::warn!(%err, "fs watch error"),
    })
    .map_err(|err| SyncError::Io(std::io::Error::other(err)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| SyncError::Io(std::io::Error::other(err)))?;

    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    let mut timer: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break;
            }
            maybe_path = raw_rx.recv() => {
                match maybe_path {
                    Some(path) => {
                        pending.insert(path);
                        timer = Some(Box::pin(tokio::time::sleep(Duration::from_millis(debounce_ms / 2))));
                    }
                    None => break,
                }
            }
            _ = wait_timer(&mut timer), if timer.is_some() => {
                let list = build_change_list(root, &pending);
                pending.clear();
                timer = None;
                if out.send(list).await.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    if let Some(t) = timer.as_mut() {
        t.await;
    }
}

fn build_change_list(root: &Path, paths: &BTreeSet<PathBuf>) -> ChangeList {
    let mut list = ChangeList::new();
    for abs in paths {
        let rel = abs.strip_prefix(root).unwrap_or(abs.as_path());
        if rel.as_os_str().is_empty() {
            continue;
        }
        let key = HostPath::new(rel.to_path_buf());
        list.reconcile_at(&key, abs);
    }
    list
}
