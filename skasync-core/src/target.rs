//! The `Target` data type: one resolved sync destination (a pod plus
//! container plus the artifact it was built from), grounded on
//! `original_source/pkg/k8s/endpoint.go`'s `Endpoint` — this project
//! collapses the original's separate `Pod`/`Endpoint` concepts into one
//! type, since both are "tag -> resolved pod" records that differ only in
//! whether an artifact was already known at config time.

use std::path::PathBuf;

use skasync_model::Tag;

use crate::artifact::Artifact;

#[derive(Debug, Clone)]
pub struct Target {
    pub tag: Tag,
    pub pod_name: String,
    pub container: String,
    /// The directory inside the container this target's artifact is mounted
    /// at. Distinct from `artifact.root_dir`, which is the host-side source
    /// tree — mirrors the original's separate `pod.RootDir` (container-side)
    /// vs. the artifact's own root.
    pub container_root: PathBuf,
    pub artifact: Artifact,
}
