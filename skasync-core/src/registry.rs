//! Component J: the target registry.
//!
//! Grounded on `original_source/pkg/k8s/endpoint.go`'s `EndpointCtrl`:
//! clear the map, resolve every configured endpoint's pod name via the
//! cluster CLI in parallel, reject pod-name collisions across targets, and
//! leave the registry partially populated on partial failure so a caller can
//! retry without losing the targets that did resolve.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use skasync_contracts::ClusterCli;
use skasync_model::{ArtifactId, Tag};
use tokio::sync::RwLock;

use crate::artifact::Artifact;
use crate::error::{Result, SyncError};
use crate::target::Target;

/// One configured sync destination, prior to pod-name resolution.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub tag: Tag,
    pub selector: String,
    pub container: String,
    pub artifact_id: ArtifactId,
    /// The directory inside the container this artifact is mounted at —
    /// distinct from `Artifact::root_dir`, which is the host-side source
    /// tree. Path translation joins a change's relative path onto this.
    pub container_root: std::path::PathBuf,
}

/// Holds the resolved `tag -> Target` map plus the immutable artifact
/// table every target's sync round reads from.
pub struct Registry {
    endpoints: Vec<EndpointConfig>,
    artifacts: BTreeMap<ArtifactId, Artifact>,
    targets: RwLock<BTreeMap<Tag, Target>>,
}

impl Registry {
    pub fn new(artifacts: BTreeMap<ArtifactId, Artifact>, endpoints: Vec<EndpointConfig>) -> Self {
        Self {
            endpoints,
            artifacts,
            targets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Atomically clear the map, then resolve every endpoint's pod name in
    /// parallel. Collisions (two endpoints resolving to the same pod name)
    /// and unknown artifact ids both count as failures. Returns
    /// `Err(SyncError::Resolve)` if any endpoint failed, but the targets
    /// that did resolve remain in the registry for the caller to use while
    /// retrying.
    pub async fn refresh(&self, cli: &dyn ClusterCli) -> Result<()> {
        {
            self.targets.write().await.clear();
        }

        let resolved = join_all(self.endpoints.iter().map(|ep| async move {
            let pod_name = cli.get_pod_name(&ep.selector).await?;
            Ok::<_, SyncError>((ep.clone(), pod_name))
        }))
        .await;

        let mut targets = self.targets.write().await;
        let mut failed = 0usize;
        let total = resolved.len();

        for outcome in resolved {
            let (ep, pod_name) = match outcome {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(%err, "failed to resolve endpoint");
                    failed += 1;
                    continue;
                }
            };

            if targets.values().any(|t| t.pod_name == pod_name) {
                tracing::warn!(pod = %pod_name, tag = %ep.tag, "duplicate pod name across targets, skipping");
                failed += 1;
                continue;
            }

            let Some(artifact) = self.artifacts.get(&ep.artifact_id) else {
                tracing::warn!(artifact = %ep.artifact_id, tag = %ep.tag, "unknown artifact id");
                failed += 1;
                continue;
            };

            targets.insert(
                ep.tag.clone(),
                Target {
                    tag: ep.tag,
                    pod_name,
                    container: ep.container,
                    container_root: ep.container_root,
                    artifact: artifact.clone(),
                },
            );
        }
        drop(targets);

        if failed > 0 {
            return Err(SyncError::Resolve { failed, total });
        }
        Ok(())
    }

    /// Every currently resolved target.
    pub async fn targets(&self) -> Vec<Target> {
        self.targets.read().await.values().cloned().collect()
    }

    /// Linear scan for a target by tag, mirroring `EndpointCtrl.FindByTag`.
    pub async fn find_by_tag(&self, tag: &Tag) -> Option<Target> {
        self.targets.read().await.get(tag).cloned()
    }
}

/// Shared-ownership alias used by the CLI wiring, since the registry is
/// read from the synchronizer and written from the status gate's
/// ready-transition callback concurrently.
pub type SharedRegistry = Arc<Registry>;
