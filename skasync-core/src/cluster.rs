//! `RealClusterCli`: the `kubectl`-backed implementation of
//! `skasync_contracts::ClusterCli`, grounded on
//! `original_source/pkg/cli/cli.go`'s `CLI.Command` and
//! `pkg/cli/kubectl.go`'s `GetPodName`.

use async_trait::async_trait;
use skasync_contracts::{ClusterCli, ClusterCliError};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Wraps `kubectl`, prefixing every invocation with `--context`/`-n`
/// when configured, matching the original's `CLI` struct baking context and
/// namespace into every `Command` it builds.
pub struct RealClusterCli {
    context: Option<String>,
    namespace: Option<String>,
}

impl RealClusterCli {
    pub fn new(context: Option<String>, namespace: Option<String>) -> Self {
        Self { context, namespace }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push("--context".to_owned());
            args.push(context.clone());
        }
        if let Some(namespace) = &self.namespace {
            args.push("-n".to_owned());
            args.push(namespace.clone());
        }
        args
    }
}

#[async_trait]
impl ClusterCli for RealClusterCli {
    async fn get_pod_name(&self, selector: &str) -> Result<String, ClusterCliError> {
        let output = Command::new("kubectl")
            .args(self.base_args())
            .args([
                "get",
                "pods",
                "-l",
                selector,
                "-o",
                "jsonpath={.items[0].metadata.name}",
            ])
            .output()
            .await
            .map_err(ClusterCliError::Spawn)?;

        if !output.status.success() {
            return Err(ClusterCliError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if name.is_empty() {
            return Err(ClusterCliError::PodNotFound {
                selector: selector.to_owned(),
            });
        }
        Ok(name)
    }

    async fn exec_rm(
        &self,
        pod: &str,
        container: &str,
        paths: &[String],
    ) -> Result<(), ClusterCliError> {
        let output = Command::new("kubectl")
            .args(self.base_args())
            .arg("exec")
            .arg(pod)
            .args(["-c", container, "--", "rm", "-rf", "--"])
            .args(paths)
            .output()
            .await
            .map_err(ClusterCliError::Spawn)?;

        if !output.status.success() {
            return Err(ClusterCliError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn exec_tar_extract(
        &self,
        pod: &str,
        container: &str,
        archive: Vec<u8>,
    ) -> Result<(), ClusterCliError> {
        let mut child = Command::new("kubectl")
            .args(self.base_args())
            .arg("exec")
            .arg(pod)
            .args([
                "-c",
                container,
                "-i",
                "--",
                "tar",
                "xmf",
                "-",
                "-C",
                "/",
                "--no-same-owner",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ClusterCliError::Spawn)?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin
            .write_all(&archive)
            .await
            .map_err(ClusterCliError::Spawn)?;
        drop(stdin);

        let output = child.wait_with_output().await.map_err(ClusterCliError::Spawn)?;
        if !output.status.success() {
            return Err(ClusterCliError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
