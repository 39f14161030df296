//! Wires a loaded [`Config`] into the running pipeline: E (filesystem
//! watcher) and F (VCS-HEAD monitor) feed G (the aggregation gateway), whose
//! flattened output passes through I (the status gate) before reaching K
//! (the fan-out synchronizer); H (the deploy-status probe) drives both I's
//! ready/not-ready transitions and, on a ready edge, J's (the target
//! registry) refresh. Mirrors `original_source/cmd/skasync/watcher.go`'s
//! `RunWatcher` and `cmd/skasync/sync.go`'s `RunSync`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use skasync_config::Config;
use skasync_contracts::ClusterCli;
use skasync_core::cluster::RealClusterCli;
use skasync_core::gateway::{flatten, Gateway};
use skasync_core::progress::ProgressMultiplexer;
use skasync_core::registry::EndpointConfig as CoreEndpointConfig;
use skasync_core::status::gate::StatusGate;
use skasync_core::status::probe::{run_probe, HttpDeployStatusSource, POLL_INTERVAL};
use skasync_core::watch::fs::watch_fs;
use skasync_core::watch::vcs::{has_git_head, watch_vcs};
use skasync_core::{Artifact, Registry, SyncConfig, Synchronizer};
use skasync_model::{ArtifactId, ChangeList, HostPath, Tag};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{self, AppState, DebugStore};
use crate::cli::SyncDirection;
use crate::shutdown;

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

fn build_artifacts(cfg: &Config) -> anyhow::Result<BTreeMap<ArtifactId, Artifact>> {
    let mut artifacts = BTreeMap::new();
    for (id, artifact_cfg) in &cfg.artifacts {
        let artifact_id = ArtifactId::from(id.as_str());
        let artifact = Artifact::load(
            artifact_id.clone(),
            artifact_cfg.image.clone(),
            artifact_cfg.root_dir.clone(),
            &cfg.root_dir,
            &artifact_cfg.dockerfile_dir,
        )
        .with_context(|| format!("loading artifact \"{id}\""))?;
        artifacts.insert(artifact_id, artifact);
    }
    Ok(artifacts)
}

fn build_endpoints(cfg: &Config) -> Vec<CoreEndpointConfig> {
    cfg.endpoints
        .iter()
        .map(|(tag, ep)| CoreEndpointConfig {
            tag: Tag::from(tag.as_str()),
            selector: ep.selector.clone(),
            container: ep.container.clone(),
            artifact_id: ArtifactId::from(ep.artifact.as_str()),
            container_root: ep.container_root.clone(),
        })
        .collect()
}

fn build_registry(cfg: &Config) -> anyhow::Result<Registry> {
    let artifacts = build_artifacts(cfg)?;
    let endpoints = build_endpoints(cfg);
    Ok(Registry::new(artifacts, endpoints))
}

/// Build a change list reconciling every path in `paths` (workspace-relative)
/// against the live filesystem under `root`. Shared by the one-shot `sync`
/// subcommand and the HTTP control surface's manual-sync endpoints.
pub(crate) fn change_list_for_paths(root: &Path, paths: &[String]) -> ChangeList {
    let mut list = ChangeList::new();
    for rel in paths {
        let key = HostPath::new(PathBuf::from(rel));
        let abs = root.join(rel);
        list.reconcile_at(&key, &abs);
    }
    list
}

/// Run the long-lived watch/sync pipeline plus its HTTP control surface,
/// until a shutdown signal arrives or a critical task fails.
pub async fn run_watcher(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    shutdown::install(cancel.clone());

    let cli: Arc<dyn ClusterCli> = Arc::new(RealClusterCli::new(
        non_empty(&config.context),
        non_empty(&config.namespace),
    ));

    let registry = Arc::new(build_registry(&config)?);
    registry
        .refresh(cli.as_ref())
        .await
        .context("initial target registry resolution failed")?;

    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let progress = Arc::new(ProgressMultiplexer::new(progress_tx));
    tokio::spawn(async move {
        while let Some(sample) = progress_rx.recv().await {
            tracing::debug!(
                all_files = sample.all_files,
                sent_files = sample.sent_files,
                bytes_sent = sample.bytes_sent,
                "sync progress"
            );
        }
    });

    let synchronizer = Arc::new(Synchronizer::new(
        config.root_dir.clone(),
        cli.clone(),
        registry.clone(),
        SyncConfig {
            rm_argv_budget_bytes: config.sync.rm_argv_budget_bytes,
        },
        Some(progress.clone()),
    ));

    let gate = Arc::new(StatusGate::new(config.status.watching_deploy_status));
    let debug_store = DebugStore::new();

    let (err_tx, mut err_rx) = mpsc::channel::<anyhow::Error>(4);

    let mut gateway = Gateway::new(config.sync.debounce_ms);
    let gateway_handle = gateway.handle();

    {
        let synchronizer = synchronizer.clone();
        let gate = gate.clone();
        let debug_store = debug_store.clone();
        gateway.subscribe(move |snapshot| {
            debug_store.push(snapshot.clone());
            let Some(list) = gate.ingest(flatten(snapshot)) else {
                return;
            };
            let synchronizer = synchronizer.clone();
            tokio::spawn(async move {
                synchronizer.sync_round(&list).await;
            });
        });
    }

    let gateway_cancel = cancel.clone();
    tokio::spawn(async move { gateway.run(gateway_cancel).await });

    spawn_fs_provider(
        config.root_dir.clone(),
        config.sync.debounce_ms,
        gateway_handle.clone(),
        cancel.clone(),
        err_tx.clone(),
    );

    if let Some(vcs_root) = config.vcs_root_dir.clone() {
        if has_git_head(&vcs_root) {
            spawn_vcs_provider(vcs_root, gateway_handle.clone(), cancel.clone(), err_tx.clone());
        } else {
            tracing::warn!(root = %vcs_root.display(), "vcsRootDir configured but no .git/HEAD found, skipping VCS monitor");
        }
    }

    spawn_status_probe(
        config.status.addr.clone(),
        config.root_dir.clone(),
        gate.clone(),
        registry.clone(),
        cli.clone(),
        synchronizer.clone(),
        cancel.clone(),
    );

    {
        let state = AppState {
            synchronizer: synchronizer.clone(),
            root_dir: config.root_dir.clone(),
            debug_store,
        };
        let port = config.api.port;
        let api_cancel = cancel.clone();
        let err_tx = err_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = api::serve(port, state, api_cancel).await {
                let _ = err_tx.send(err).await;
            }
        });
    }

    tracing::info!("skasync is started");

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("shutting down");
            Ok(())
        }
        Some(err) = err_rx.recv() => {
            cancel.cancel();
            Err(err)
        }
    }
}

fn spawn_fs_provider(
    root: PathBuf,
    debounce_ms: u64,
    handle: skasync_core::gateway::GatewayHandle,
    cancel: CancellationToken,
    err_tx: mpsc::Sender<anyhow::Error>,
) {
    let (tx, mut rx) = mpsc::channel::<ChangeList>(16);
    let watch_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = watch_fs(&root, debounce_ms, tx, watch_cancel).await {
            let _ = err_tx.send(err.into()).await;
        }
    });
    tokio::spawn(async move {
        while let Some(list) = rx.recv().await {
            handle.feed("fs", list);
        }
    });
}

fn spawn_vcs_provider(
    root: PathBuf,
    handle: skasync_core::gateway::GatewayHandle,
    cancel: CancellationToken,
    err_tx: mpsc::Sender<anyhow::Error>,
) {
    let (tx, mut rx) = mpsc::channel::<ChangeList>(16);
    tokio::spawn(async move {
        if let Err(err) = watch_vcs(&root, tx, cancel).await {
            let _ = err_tx.send(err.into()).await;
        }
    });
    tokio::spawn(async move {
        while let Some(list) = rx.recv().await {
            handle.feed("vcs", list);
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_status_probe(
    addr: String,
    root_dir: PathBuf,
    gate: Arc<StatusGate>,
    registry: Arc<Registry>,
    cli: Arc<dyn ClusterCli>,
    synchronizer: Arc<Synchronizer>,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel(16);
    let probe_cancel = cancel.clone();
    tokio::spawn(async move {
        let source = HttpDeployStatusSource::new(&addr);
        run_probe(source, POLL_INTERVAL, tx, probe_cancel).await;
    });

    tokio::spawn(async move {
        while let Some(status) = rx.recv().await {
            let registry = registry.clone();
            let cli = cli.clone();
            let flushed = gate
                .observe_status(status, &root_dir, || async move {
                    if let Err(err) = registry.refresh(cli.as_ref()).await {
                        tracing::warn!(%err, "target registry refresh failed");
                    }
                })
                .await;
            if let Some(list) = flushed {
                let synchronizer = synchronizer.clone();
                tokio::spawn(async move {
                    synchronizer.sync_round(&list).await;
                });
            }
        }
    });
}

/// Run a one-shot sync of `paths` into `targets`, bypassing change detection
/// entirely (the paths are taken as given and re-stated against the live
/// filesystem). Mirrors `original_source/cmd/skasync/sync.go`'s
/// `inSyncDiraction`.
pub async fn run_sync(
    config: Config,
    direction: SyncDirection,
    targets: String,
    paths: String,
) -> anyhow::Result<()> {
    if direction == SyncDirection::Out {
        bail!("sync direction \"out\" is not implemented");
    }

    let cli: Arc<dyn ClusterCli> = Arc::new(RealClusterCli::new(
        non_empty(&config.context),
        non_empty(&config.namespace),
    ));

    let registry = Arc::new(build_registry(&config)?);
    registry
        .refresh(cli.as_ref())
        .await
        .context("target registry resolution failed")?;

    let synchronizer = Synchronizer::new(
        config.root_dir.clone(),
        cli,
        registry.clone(),
        SyncConfig {
            rm_argv_budget_bytes: config.sync.rm_argv_budget_bytes,
        },
        None,
    );

    let rel_paths: Vec<String> = paths.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect();
    if rel_paths.is_empty() {
        bail!("no paths given to sync");
    }
    let list = change_list_for_paths(&config.root_dir, &rel_paths);

    if targets.trim() == "all" {
        let reports = synchronizer.sync_round(&list).await;
        for (tag, report) in reports {
            tracing::info!(%tag, deleted = report.deleted, modified = report.modified, "synced");
        }
        return Ok(());
    }

    for raw_tag in targets.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let tag = Tag::from(raw_tag);
        match synchronizer.sync_target_by_tag(&tag, &list).await {
            Some(report) => {
                tracing::info!(%tag, deleted = report.deleted, modified = report.modified, "synced");
            }
            None => bail!("target \"{raw_tag}\" not found"),
        }
    }
    Ok(())
}
