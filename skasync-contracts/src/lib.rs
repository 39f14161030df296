//! Trait surfaces tying the sync pipeline's external-process and
//! external-HTTP concerns to concrete implementations, so `skasync-core`'s
//! tests can swap in fakes for `kubectl` and the deploy-status feed instead
//! of requiring a live cluster, mirroring the original's direct `*cli.CLI`/
//! `*k8s.PodsCtrl` dependencies (`original_source/pkg/cli/kubectl.go`,
//! `pkg/skaffold/status_probe.go`) behind an interface a test double can
//! implement.

use async_trait::async_trait;
use skasync_model::DeployStatus;
use thiserror::Error;

/// Errors a `ClusterCli` implementation can report back to the caller.
#[derive(Debug, Error)]
pub enum ClusterCliError {
    /// The underlying `kubectl` (or equivalent) process failed to start.
    #[error("failed to launch cluster CLI: {0}")]
    Spawn(#[source] std::io::Error),
    /// The process ran but exited non-zero; stderr is captured for logging.
    #[error("cluster CLI exited with status {status}: {stderr}")]
    NonZeroExit {
        /// Raw process exit status, when the OS reports one.
        status: i32,
        /// Captured stderr.
        stderr: String,
    },
    /// A pod selector matched no pods, or the lookup otherwise came back
    /// empty.
    #[error("no pod found for selector {selector:?}")]
    PodNotFound {
        /// The selector that was queried.
        selector: String,
    },
}

/// The subset of `kubectl`-shaped operations the sync pipeline needs:
/// resolving a pod name from a label selector, and running the two bulk
/// mutations (`exec ... rm -rf --`, `exec ... tar xmf -`) against a pod.
///
/// Grounded on `original_source/pkg/cli/kubectl.go`'s `GetPodName` and
/// `pkg/sync/pod_syncer.go`'s `deleteFile`/`copyFile`, generalized into a
/// trait so `skasync-core`'s integration tests exercise the fan-out
/// synchronizer (component K) against a fake instead of a real cluster.
#[async_trait]
pub trait ClusterCli: Send + Sync {
    /// Resolve the pod name matching a label selector (e.g.
    /// `app=my-service`).
    async fn get_pod_name(&self, selector: &str) -> Result<String, ClusterCliError>;

    /// Run `exec <pod> -c <container> -- rm -rf -- <paths...>`.
    async fn exec_rm(
        &self,
        pod: &str,
        container: &str,
        paths: &[String],
    ) -> Result<(), ClusterCliError>;

    /// Run `exec <pod> -c <container> -i -- tar xmf - -C / --no-same-owner`,
    /// streaming `archive` into the child process's stdin.
    async fn exec_tar_extract(
        &self,
        pod: &str,
        container: &str,
        archive: Vec<u8>,
    ) -> Result<(), ClusterCliError>;
}

/// Errors a `DeployStatusSource` implementation can report.
#[derive(Debug, Error)]
pub enum DeployStatusError {
    /// The HTTP transport failed outright (connection refused, DNS, etc).
    #[error("deploy status feed unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    /// The feed answered but the body could not be parsed.
    #[error("deploy status feed returned malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// A source of deploy/build status, abstracting over `GET /v1/state`
/// (`original_source/pkg/skaffold/status_probe.go`) so the status gate
/// (component I) can be tested against a fake feed.
#[async_trait]
pub trait DeployStatusSource: Send + Sync {
    /// Poll the feed once and return the parsed status.
    async fn poll(&self) -> Result<DeployStatus, DeployStatusError>;
}
