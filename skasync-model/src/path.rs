use std::path::{Path, PathBuf};

/// A path on the developer's workstation, relative to an artifact's root.
///
/// Wraps `PathBuf` rather than a bare `String` (the Go original keys
/// `ChangeList` by plain string path, see
/// `original_source/pkg/filemon/changelist.go`) so the rest of the pipeline
/// gets a `Hash + Ord` key type and one place to own the `/`-normalization
/// used when an entry crosses into a container (archive entry names, `rm`
/// argv) or a VCS diff (which always reports `/`-separated paths).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostPath(PathBuf);

impl HostPath {
    /// Wrap an existing path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrow the underlying path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume and return the underlying `PathBuf`.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Render with `/` separators regardless of host OS, the form archive
    /// entry names and `rm -rf` argv both expect.
    pub fn to_slash_string(&self) -> String {
        #[cfg(windows)]
        {
            self.0.to_string_lossy().replace('\\', "/")
        }
        #[cfg(not(windows))]
        {
            self.0.to_string_lossy().into_owned()
        }
    }
}

impl From<PathBuf> for HostPath {
    fn from(value: PathBuf) -> Self {
        Self(value)
    }
}

impl From<&Path> for HostPath {
    fn from(value: &Path) -> Self {
        Self(value.to_path_buf())
    }
}

impl std::fmt::Display for HostPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_string_is_stable_on_unix_paths() {
        let p = HostPath::new("src/main.rs");
        assert_eq!(p.to_slash_string(), "src/main.rs");
    }

    #[test]
    fn ordering_is_lexicographic_over_path_components() {
        let a = HostPath::new("a/one.rs");
        let b = HostPath::new("b/two.rs");
        assert!(a < b);
    }
}
