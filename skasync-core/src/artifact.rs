//! The `Artifact` data type: an image's source tree plus its compiled
//! ignore predicate, grounded on `original_source/pkg/docker/artifact.go`'s
//! `Artifact`/`ArtifactService.Register`.

use std::path::{Path, PathBuf};

use skasync_model::ArtifactId;

use crate::error::Result;
use crate::ignore::{load_ignore_patterns, IgnorePredicate};

#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ArtifactId,
    pub image: String,
    pub root_dir: PathBuf,
    pub ignore: IgnorePredicate,
}

impl Artifact {
    /// Load an artifact's ignore patterns from `dockerfile_dir` (falling
    /// back to `workspace_root`) and compile them against `workspace_root`,
    /// mirroring `ArtifactService.Register`'s `GetIgnoreList` +
    /// `NewDockerIgnorePredicate` pair.
    pub fn load(
        id: ArtifactId,
        image: String,
        root_dir: PathBuf,
        workspace_root: &Path,
        dockerfile_dir: &Path,
    ) -> Result<Self> {
        let patterns = load_ignore_patterns(workspace_root, dockerfile_dir)?;
        let ignore = IgnorePredicate::compile(workspace_root, &patterns)?;
        Ok(Self {
            id,
            image,
            root_dir,
            ignore,
        })
    }
}
