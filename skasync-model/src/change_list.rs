use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::{FileInfo, HostPath};

/// The set of filesystem changes observed since the last round.
///
/// Three buckets rather than the Go original's two (`Modified`/`Deleted` in
/// `original_source/pkg/filemon/changelist.go`): Added is kept as a
/// first-class bucket throughout this crate instead of being folded into
/// Modified the way the original's `endpoint_syncer.go` does at the call
/// site. `BTreeMap` (not `HashMap`) gives the `Display` impl and the
/// union-associativity property test deterministic iteration order; nothing
/// in the pipeline depends on bucket ordering for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeList {
    added: BTreeMap<HostPath, FileInfo>,
    modified: BTreeMap<HostPath, FileInfo>,
    deleted: BTreeMap<HostPath, SystemTime>,
}

impl ChangeList {
    /// An empty change list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) an Added entry.
    pub fn add_added(&mut self, path: HostPath, info: FileInfo) {
        self.added.insert(path, info);
    }

    /// Record (or overwrite) a Modified entry.
    pub fn add_modified(&mut self, path: HostPath, info: FileInfo) {
        self.modified.insert(path, info);
    }

    /// Record (or overwrite) a Deleted entry.
    pub fn add_deleted(&mut self, path: HostPath, at: SystemTime) {
        self.deleted.insert(path, at);
    }

    /// The Added bucket.
    pub fn added(&self) -> &BTreeMap<HostPath, FileInfo> {
        &self.added
    }

    /// The Modified bucket.
    pub fn modified(&self) -> &BTreeMap<HostPath, FileInfo> {
        &self.modified
    }

    /// The Deleted bucket.
    pub fn deleted(&self) -> &BTreeMap<HostPath, SystemTime> {
        &self.deleted
    }

    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total entry count across all three buckets.
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Added ∪ Modified, the set of paths a sync round needs to `put`.
    /// When a path appears in both buckets, the Modified snapshot wins: it
    /// reflects a later re-stat than whatever produced the Added entry.
    pub fn modified_and_added(&self) -> BTreeMap<HostPath, FileInfo> {
        let mut out = self.added.clone();
        out.extend(self.modified.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Pointwise union of two change lists, bucket by bucket. Right-hand
    /// side wins on key collision within a bucket; this does not resolve a
    /// path that lands in different buckets across `self` and `other` (e.g.
    /// Added in `self`, Deleted in `other`) — downstream consumers always
    /// read through `modified_and_added()`/`deleted()` rather than assuming
    /// a path appears in exactly one bucket.
    pub fn union(&self, other: &Self) -> Self {
        let mut added = self.added.clone();
        added.extend(other.added.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut modified = self.modified.clone();
        modified.extend(other.modified.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut deleted = self.deleted.clone();
        deleted.extend(other.deleted.iter().map(|(k, v)| (k.clone(), *v)));
        Self {
            added,
            modified,
            deleted,
        }
    }

    /// Re-stat `path` (used directly as the filesystem path) and reclassify
    /// it under itself as the bucket key. Convenience for callers whose keys
    /// are already directly statable; watchers rooted below some directory
    /// should use [`ChangeList::reconcile_at`] instead, since their bucket
    /// keys are root-relative while the stat target needs to be absolute.
    pub fn reconcile(&mut self, path: &HostPath) {
        self.reconcile_at(path, path.as_path());
    }

    /// Re-stat `abs_path` and reclassify `key` between Modified and Deleted,
    /// mirroring `ChangeFilesToChangeListConverter` in
    /// `original_source/pkg/filemon/changelist.go`: a path that no longer
    /// exists moves (or stays) in Deleted with a fresh timestamp; a path
    /// that exists and is a regular entry moves (or stays) in Modified.
    /// Added is left untouched — reconcile only ever resolves a
    /// previously-known path's current state, it does not discover new
    /// paths.
    pub fn reconcile_at(&mut self, key: &HostPath, abs_path: &std::path::Path) {
        match FileInfo::from_path(abs_path) {
            Ok(info) => {
                self.deleted.remove(key);
                self.modified.insert(key.clone(), info);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.modified.remove(key);
                self.deleted.insert(key.clone(), SystemTime::now());
            }
            Err(_) => {
                // Transient stat error (permission denied, race with
                // another process). Leave the existing classification
                // alone rather than guessing.
            }
        }
    }
}

impl std::fmt::Display for ChangeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Added ({}) +++", self.added.len())?;
        for path in self.added.keys() {
            writeln!(f, "\t- {path}")?;
        }
        writeln!(f, "Modified ({}) ~~~", self.modified.len())?;
        for path in self.modified.keys() {
            writeln!(f, "\t- {path}")?;
        }
        writeln!(f, "Deleted ({}) ---", self.deleted.len())?;
        for path in self.deleted.keys() {
            writeln!(f, "\t- {path}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_info() -> FileInfo {
        FileInfo::regular(0, SystemTime::UNIX_EPOCH, 0o644)
    }

    #[test]
    fn add_overwrites_same_bucket_entry() {
        let mut cl = ChangeList::new();
        let p = HostPath::new("a.txt");
        cl.add_modified(p.clone(), sample_info());
        cl.add_modified(p.clone(), FileInfo::regular(5, SystemTime::UNIX_EPOCH, 0o644));
        assert_eq!(cl.modified().get(&p).unwrap().len, 5);
    }

    #[test]
    fn modified_and_added_prefers_modified_on_collision() {
        let mut cl = ChangeList::new();
        let p = HostPath::new("a.txt");
        cl.add_added(p.clone(), FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644));
        cl.add_modified(p.clone(), FileInfo::regular(2, SystemTime::UNIX_EPOCH, 0o644));
        let merged = cl.modified_and_added();
        assert_eq!(merged.get(&p).unwrap().len, 2);
    }

    #[test]
    fn union_right_hand_wins_within_bucket() {
        let mut a = ChangeList::new();
        let mut b = ChangeList::new();
        let p = HostPath::new("a.txt");
        a.add_modified(p.clone(), FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644));
        b.add_modified(p.clone(), FileInfo::regular(2, SystemTime::UNIX_EPOCH, 0o644));
        let merged = a.union(&b);
        assert_eq!(merged.modified().get(&p).unwrap().len, 2);
    }

    proptest! {
        #[test]
        fn union_is_associative(
            keys_a in prop::collection::vec("[a-z]{1,6}", 0..5),
            keys_b in prop::collection::vec("[a-z]{1,6}", 0..5),
            keys_c in prop::collection::vec("[a-z]{1,6}", 0..5),
        ) {
            let build = |keys: &[String]| {
                let mut cl = ChangeList::new();
                for k in keys {
                    cl.add_modified(HostPath::new(k.as_str()), sample_info());
                }
                cl
            };
            let a = build(&keys_a);
            let b = build(&keys_b);
            let c = build(&keys_c);
            prop_assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        }
    }
}
