//! Component B: the per-artifact ignore predicate.
//!
//! Grounded on `original_source/pkg/docker/ignore_predicate.go`'s
//! `NewDockerIgnorePredicate` and `pkg/docker/dockerignore.go`'s
//! `GetIgnoreList`, rebuilt over the `ignore` crate's compiled gitignore
//! matcher instead of the original's `docker/pkg/fileutils.PatternMatcher`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{Result, SyncError};

/// A compiled, per-artifact ignore matcher. Cheap to clone (`Arc`-wrapped)
/// so every target sharing an artifact can hold its own copy without
/// recompiling patterns.
#[derive(Debug, Clone)]
pub struct IgnorePredicate {
    inner: Arc<Gitignore>,
    reincludes: Arc<Vec<String>>,
}

/// What [`IgnorePredicate::matched`] found for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreOutcome {
    /// Path is not ignored; walk/sync should include it.
    Kept,
    /// Path is ignored. For a file this just means skip it; for a
    /// directory, callers should still descend because a re-include
    /// pattern reaches inside.
    Ignored,
    /// Path is ignored and, since it's a directory with no re-include
    /// reaching into it, the whole subtree can be skipped without walking
    /// it.
    IgnoredSkipSubtree,
}

impl IgnorePredicate {
    /// Compile a pattern list (container-ignore syntax: globs, `!`-prefixed
    /// re-includes) rooted at `base`.
    pub fn compile(base: &Path, patterns: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(base);
        let mut reincludes = Vec::new();
        for line in patterns {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(stripped) = trimmed.strip_prefix('!') {
                reincludes.push(stripped.trim_start_matches('/').to_owned());
            }
            builder
                .add_line(None, trimmed)
                .map_err(|source| SyncError::IgnorePattern {
                    path: base.to_path_buf(),
                    source,
                })?;
        }
        let inner = builder.build().map_err(|source| SyncError::IgnorePattern {
            path: base.to_path_buf(),
            source,
        })?;
        Ok(Self {
            inner: Arc::new(inner),
            reincludes: Arc::new(reincludes),
        })
    }

    /// An empty predicate that ignores nothing, used when an artifact has
    /// no ignore file.
    pub fn empty(base: &Path) -> Self {
        Self::compile(base, &[]).expect("empty pattern list always compiles")
    }

    /// Test a path (relative to the base the predicate was compiled with).
    pub fn matched(&self, rel_path: &Path, is_dir: bool) -> IgnoreOutcome {
        match self.inner.matched(rel_path, is_dir) {
            ignore::Match::Ignore(_) => {
                if is_dir && !self.reinclude_reaches_into(rel_path) {
                    IgnoreOutcome::IgnoredSkipSubtree
                } else {
                    IgnoreOutcome::Ignored
                }
            }
            _ => IgnoreOutcome::Kept,
        }
    }

    /// Convenience boolean view used by the fan-out synchronizer, which
    /// only cares whether a path is allowed through, not why.
    pub fn is_ignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        !matches!(self.matched(rel_path, is_dir), IgnoreOutcome::Kept)
    }

    fn reinclude_reaches_into(&self, dir_rel: &Path) -> bool {
        if self.reincludes.is_empty() {
            return false;
        }
        let dir_slash = format!("{}/", dir_rel.to_string_lossy());
        self.reincludes.iter().any(|pat| {
            let pat_slash = format!("{pat}/");
            pat_slash.starts_with(&dir_slash)
        })
    }
}

/// Resolve and read an artifact's ignore pattern list, searching (in order)
/// `<dockerfile_dir>.skasyncignore` then `<root>/.skasyncignore`, matching
/// `GetIgnoreList`'s search order exactly but under this project's own
/// ignore-file convention. Returns an empty list if neither exists.
pub fn load_ignore_patterns(root: &Path, dockerfile_dir: &Path) -> std::io::Result<Vec<String>> {
    let candidates = [
        PathBuf::from(format!("{}.skasyncignore", dockerfile_dir.display())),
        root.join(".skasyncignore"),
    ];
    for candidate in candidates {
        if candidate.exists() {
            let data = std::fs::read_to_string(&candidate)?;
            return Ok(data.lines().map(str::to_owned).collect());
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_directory_without_reinclude_skips_subtree() {
        let base = PathBuf::from("/workspace");
        let patterns = vec!["node_modules".to_owned()];
        let pred = IgnorePredicate::compile(&base, &patterns).unwrap();
        let outcome = pred.matched(Path::new("node_modules"), true);
        assert_eq!(outcome, IgnoreOutcome::IgnoredSkipSubtree);
    }

    #[test]
    fn ignored_directory_with_reinclude_does_not_skip_subtree() {
        let base = PathBuf::from("/workspace");
        let patterns = vec![
            "build".to_owned(),
            "!build/keep".to_owned(),
        ];
        let pred = IgnorePredicate::compile(&base, &patterns).unwrap();
        let outcome = pred.matched(Path::new("build"), true);
        assert_eq!(outcome, IgnoreOutcome::Ignored);
    }

    #[test]
    fn non_matching_path_is_kept() {
        let base = PathBuf::from("/workspace");
        let pred = IgnorePredicate::compile(&base, &["*.log".to_owned()]).unwrap();
        assert_eq!(pred.matched(Path::new("src/main.rs"), false), IgnoreOutcome::Kept);
    }
}
