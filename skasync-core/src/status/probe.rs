//! Component H: the deploy-status probe.
//!
//! Grounded on `original_source/pkg/skaffold/status_probe.go`'s `getState`
//! and `Listen`: poll `GET /v1/state` every 500ms, derive `ready` from the
//! reported `deployState`/`statusCheckState` phases, and publish to
//! subscribers. `reqwest` replaces the original's bare `net/http.Client`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use skasync_contracts::{DeployStatusError, DeployStatusSource};
use skasync_model::DeployStatus;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The polling interval the original hard-codes in `Listen`.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a `GET /v1/state` endpoint over HTTP.
pub struct HttpDeployStatusSource {
    url: String,
    client: reqwest::Client,
}

impl HttpDeployStatusSource {
    /// `addr` is a `host:port` pair, matching `original_source/pkg/skaffold/
    /// config.go`'s `Config.Addr` (default `127.0.0.1:50052`).
    pub fn new(addr: &str) -> Self {
        Self {
            url: format!("http://{addr}/v1/state"),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct StatePhase {
    status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StateResponse {
    #[serde(rename = "deployState")]
    deploy_state: Option<StatePhase>,
    #[serde(rename = "statusCheckState")]
    status_check_state: Option<StatePhase>,
    #[serde(rename = "buildState")]
    build_state: Option<BuildState>,
}

#[derive(Debug, Deserialize, Default)]
struct BuildState {
    artifacts: Option<BTreeMap<String, String>>,
}

#[async_trait]
impl DeployStatusSource for HttpDeployStatusSource {
    async fn poll(&self) -> Result<DeployStatus, DeployStatusError> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(_) => return Ok(DeployStatus::unreachable()),
        };

        if !response.status().is_success() {
            return Ok(DeployStatus::not_ready());
        }

        let body: StateResponse = response
            .json()
            .await
            .map_err(|err| DeployStatusError::Transport(err))?;

        let mut status = DeployStatus {
            deploy: body
                .deploy_state
                .and_then(|s| s.status)
                .unwrap_or_default(),
            status_check: body
                .status_check_state
                .and_then(|s| s.status)
                .unwrap_or_default(),
            artifacts: body
                .build_state
                .and_then(|b| b.artifacts)
                .unwrap_or_default(),
            ready: false,
            unreachable: false,
        };
        status.recompute_ready();
        Ok(status)
    }
}

/// Drive a [`DeployStatusSource`] on a fixed interval, publishing every
/// result (including transport-failure-derived `unreachable` statuses) on
/// `out` until `cancel` fires.
pub async fn run_probe<S: DeployStatusSource>(
    source: S,
    interval: Duration,
    out: mpsc::Sender<DeployStatus>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let status = match source.poll().await {
                    Ok(status) => status,
                    Err(err) => {
                        tracing::warn!(%err, "deploy status poll failed");
                        DeployStatus::unreachable()
                    }
                };
                if out.send(status).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysReady;

    #[async_trait]
    impl DeployStatusSource for AlwaysReady {
        async fn poll(&self) -> Result<DeployStatus, DeployStatusError> {
            let mut status = DeployStatus {
                deploy: "Complete".to_owned(),
                status_check: "Succeeded".to_owned(),
                artifacts: BTreeMap::new(),
                ready: false,
                unreachable: false,
            };
            status.recompute_ready();
            Ok(status)
        }
    }

    #[tokio::test]
    async fn run_probe_publishes_ready_status() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_probe(AlwaysReady, Duration::from_millis(5), tx, run_cancel).await;
        });

        let status = rx.recv().await.unwrap();
        assert!(status.ready);
        cancel.cancel();
        let _ = handle.await;
    }
}
