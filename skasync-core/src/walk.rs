//! Component C: the file-tree walker.
//!
//! Grounded on `original_source/pkg/filesystem/files_map.go`'s
//! `WalkForSubpath`, generalized onto the `ignore` crate's `WalkBuilder`
//! (the same crate backs the ignore predicate) instead of `filepath.Walk`,
//! so `skip_subtree` can be enforced at each directory boundary via
//! `filter_entry` rather than post-filtering every entry under an ignored
//! directory.

use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;
use skasync_model::{FileInfo, HostPath};

use crate::error::Result;
use crate::ignore::{IgnoreOutcome, IgnorePredicate};

/// Walk `root`, returning every regular file (and relative symlink) not
/// excluded by `predicate`, keyed by path relative to `root`.
///
/// Absolute-target symlinks are skipped with a warning; sockets are skipped
/// silently; per-entry walk errors are logged and skipped rather than
/// aborting the whole walk — all matching the contract in spec.md §4.C.
pub fn walk_root(root: &Path, predicate: &IgnorePredicate) -> Result<BTreeMap<HostPath, FileInfo>> {
    let mut out = BTreeMap::new();

    let filter_predicate = predicate.clone();
    let filter_root = root.to_path_buf();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .filter_entry(move |entry| {
            let rel = entry.path().strip_prefix(&filter_root).unwrap_or(entry.path());
            if rel.as_os_str().is_empty() {
                return true;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !matches!(
                filter_predicate.matched(rel, is_dir),
                IgnoreOutcome::IgnoredSkipSubtree
            )
        })
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "walk entry error, skipping");
                continue;
            }
        };

        let path = entry.path();
        if path == root {
            continue;
        }

        let file_type = match entry.file_type() {
            Some(t) => t,
            None => continue,
        };
        if file_type.is_dir() {
            continue;
        }
        if is_socket(path) {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        if predicate.is_ignored(rel, false) {
            continue;
        }

        match FileInfo::from_path(path) {
            Ok(info) => {
                if info.is_symlink {
                    let absolute_target = info
                        .symlink_target
                        .as_ref()
                        .is_some_and(|t| t.is_absolute());
                    if absolute_target {
                        tracing::warn!(path = %path.display(), "skipping symlink with absolute target, only relative symlinks are supported");
                        continue;
                    }
                }
                out.insert(HostPath::new(rel.to_path_buf()), info);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping walk entry");
            }
        }
    }

    Ok(out)
}

#[cfg(unix)]
fn is_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_socket())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_socket(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_skips_ignored_subtree_entirely() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.json"), b"{}").unwrap();
        fs::write(dir.path().join("main.rs"), b"fn main() {}").unwrap();

        let predicate = IgnorePredicate::compile(dir.path(), &["node_modules".to_owned()]).unwrap();
        let files = walk_root(dir.path(), &predicate).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files.keys().any(|p| p.as_path() == Path::new("main.rs")));
    }
}
