use std::path::PathBuf;
use std::time::SystemTime;

/// An owned snapshot of a file's stat(2) data.
///
/// Replaces Go's `fs.FileInfo` interface (used throughout
/// `original_source/pkg/filesystem` and `pkg/filemon`) with a plain struct so
/// `ChangeList` stays `Clone + Send` across channel hops instead of carrying
/// a trait object tied to the walk that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// File size in bytes. Meaningless for symlinks.
    pub len: u64,
    /// Last-modified time reported by the filesystem.
    pub modified: SystemTime,
    /// POSIX permission bits. Hosts without POSIX permissions (Windows) stub
    /// this to `0o644` / `0o755` per the archive builder's forced mode.
    pub mode: u32,
    /// Whether the entry is a symlink rather than a regular file.
    pub is_symlink: bool,
    /// The symlink's target, when `is_symlink` is set and the target could
    /// be read. `None` for regular files, and for symlinks whose target
    /// could not be resolved (the walker logs and skips those instead).
    pub symlink_target: Option<PathBuf>,
}

impl FileInfo {
    /// Build a snapshot for a regular file.
    pub fn regular(len: u64, modified: SystemTime, mode: u32) -> Self {
        Self {
            len,
            modified,
            mode,
            is_symlink: false,
            symlink_target: None,
        }
    }

    /// Build a snapshot for a symlink with a known target.
    pub fn symlink(modified: SystemTime, mode: u32, target: PathBuf) -> Self {
        Self {
            len: 0,
            modified,
            mode,
            is_symlink: true,
            symlink_target: Some(target),
        }
    }

    /// Snapshot a path already known to exist, reading its symlink target
    /// when applicable. Used by [`crate::ChangeList::reconcile`] and by the
    /// file-tree walker in `skasync-core`.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let meta = std::fs::symlink_metadata(path)?;
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let mode = file_mode(&meta);
        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(path)?;
            Ok(Self::symlink(modified, mode, target))
        } else {
            Ok(Self::regular(meta.len(), modified, mode))
        }
    }
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}
