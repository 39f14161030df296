//! End-to-end tests over the public `skasync-core` surface: a fake
//! `ClusterCli` stands in for `kubectl`, real temp directories stand in for
//! the workstation and the ignore file, and every stage from the target
//! registry through the fan-out synchronizer and the status gate runs for
//! real.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skasync_contracts::{ClusterCli, ClusterCliError};
use skasync_core::gateway::{flatten, Gateway};
use skasync_core::registry::EndpointConfig;
use skasync_core::status::gate::StatusGate;
use skasync_core::{Artifact, Registry, SyncConfig, Synchronizer};
use skasync_model::{ArtifactId, ChangeList, DeployStatus, HostPath, Tag};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Call {
    Rm { pod: String, container: String, paths: Vec<String> },
    Extract { pod: String, container: String, archive: Vec<u8> },
}

#[derive(Default)]
struct FakeCli {
    pods: BTreeMap<String, String>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCli {
    fn new(pods: &[(&str, &str)]) -> Self {
        Self {
            pods: pods.iter().map(|(sel, pod)| (sel.to_string(), pod.to_string())).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterCli for FakeCli {
    async fn get_pod_name(&self, selector: &str) -> Result<String, ClusterCliError> {
        self.pods
            .get(selector)
            .cloned()
            .ok_or_else(|| ClusterCliError::PodNotFound { selector: selector.to_owned() })
    }

    async fn exec_rm(&self, pod: &str, container: &str, paths: &[String]) -> Result<(), ClusterCliError> {
        self.calls.lock().unwrap().push(Call::Rm {
            pod: pod.to_owned(),
            container: container.to_owned(),
            paths: paths.to_vec(),
        });
        Ok(())
    }

    async fn exec_tar_extract(&self, pod: &str, container: &str, archive: Vec<u8>) -> Result<(), ClusterCliError> {
        self.calls.lock().unwrap().push(Call::Extract {
            pod: pod.to_owned(),
            container: container.to_owned(),
            archive,
        });
        Ok(())
    }
}

fn load_artifact(id: &str, root: &std::path::Path) -> Artifact {
    Artifact::load(ArtifactId::from(id), format!("{id}:dev"), root.to_path_buf(), root, root).unwrap()
}

async fn build_registry(root: &std::path::Path, cli: &dyn ClusterCli, endpoints: Vec<(&str, &str, &str, &str)>) -> Registry {
    let mut artifacts = BTreeMap::new();
    let mut eps = Vec::new();
    for (tag, selector, container, artifact_id) in endpoints {
        artifacts.entry(ArtifactId::from(artifact_id)).or_insert_with(|| load_artifact(artifact_id, root));
        eps.push(EndpointConfig {
            tag: Tag::from(tag),
            selector: selector.to_owned(),
            container: container.to_owned(),
            artifact_id: ArtifactId::from(artifact_id),
            container_root: PathBuf::from("/app"),
        });
    }
    let registry = Registry::new(artifacts, eps);
    registry.refresh(cli).await.unwrap();
    registry
}

fn touch(root: &std::path::Path, rel: &str, contents: &[u8]) -> HostPath {
    let abs = root.join(rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&abs, contents).unwrap();
    HostPath::new(rel)
}

fn change_list_touch(root: &std::path::Path, rel: &str) -> ChangeList {
    let key = HostPath::new(rel);
    let mut list = ChangeList::new();
    list.reconcile_at(&key, &root.join(rel));
    list
}

#[tokio::test]
async fn touch_syncs_to_the_matching_target() {
    let dir = tempfile::tempdir().unwrap();
    let cli = FakeCli::new(&[("app=one", "pod-one")]);
    let registry = build_registry(dir.path(), &cli, vec![("one", "app=one", "app", "one")]).await;
    let synchronizer = Synchronizer::new(
        dir.path().to_path_buf(),
        Arc::new(cli),
        Arc::new(registry),
        SyncConfig::default(),
        None,
    );

    touch(dir.path(), "src/main.rs", b"fn main() {}");
    let list = change_list_touch(dir.path(), "src/main.rs");

    let reports = synchronizer.sync_round(&list).await;
    let report = reports.get(&Tag::from("one")).unwrap();
    assert_eq!(report.modified, 1);
    assert_eq!(report.deleted, 0);
}

#[tokio::test]
async fn delete_issues_rm_against_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Arc::new(FakeCli::new(&[("app=one", "pod-one")]));
    let registry = Arc::new(build_registry(dir.path(), cli.as_ref(), vec![("one", "app=one", "app", "one")]).await);
    let synchronizer = Synchronizer::new(dir.path().to_path_buf(), cli.clone(), registry, SyncConfig::default(), None);

    let key = touch(dir.path(), "gone.txt", b"x");
    std::fs::remove_file(dir.path().join("gone.txt")).unwrap();
    let mut list = ChangeList::new();
    list.reconcile_at(&key, &dir.path().join("gone.txt"));

    let reports = synchronizer.sync_round(&list).await;
    assert_eq!(reports.get(&Tag::from("one")).unwrap().deleted, 1);

    let calls = cli.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::Rm { paths, .. } if paths == &vec!["/app/gone.txt".to_owned()])));
}

#[tokio::test]
async fn ignored_path_never_reaches_the_cluster_cli() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".skasyncignore"), "*.log\n").unwrap();
    let cli = Arc::new(FakeCli::new(&[("app=one", "pod-one")]));
    let registry = Arc::new(build_registry(dir.path(), cli.as_ref(), vec![("one", "app=one", "app", "one")]).await);
    let synchronizer = Synchronizer::new(dir.path().to_path_buf(), cli.clone(), registry, SyncConfig::default(), None);

    touch(dir.path(), "debug.log", b"noisy");
    let list = change_list_touch(dir.path(), "debug.log");

    let reports = synchronizer.sync_round(&list).await;
    assert_eq!(reports.get(&Tag::from("one")).unwrap().total(), 0);
    assert!(cli.calls().is_empty());
}

#[tokio::test]
async fn two_targets_sync_independently_in_one_round() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Arc::new(FakeCli::new(&[("app=one", "pod-one"), ("app=two", "pod-two")]));
    let registry = Arc::new(
        build_registry(
            dir.path(),
            cli.as_ref(),
            vec![("one", "app=one", "app", "shared"), ("two", "app=two", "app", "shared")],
        )
        .await,
    );
    let synchronizer = Synchronizer::new(dir.path().to_path_buf(), cli.clone(), registry, SyncConfig::default(), None);

    touch(dir.path(), "shared.txt", b"payload");
    let list = change_list_touch(dir.path(), "shared.txt");

    let reports = synchronizer.sync_round(&list).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports.get(&Tag::from("one")).unwrap().modified, 1);
    assert_eq!(reports.get(&Tag::from("two")).unwrap().modified, 1);

    let calls = cli.calls();
    let pods_extracted: Vec<&str> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Extract { pod, .. } => Some(pod.as_str()),
            _ => None,
        })
        .collect();
    assert!(pods_extracted.contains(&"pod-one"));
    assert!(pods_extracted.contains(&"pod-two"));
}

#[tokio::test]
async fn deploy_bounce_buffers_then_flushes_on_ready() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "queued.txt", b"during outage");
    let list = change_list_touch(dir.path(), "queued.txt");

    let gate = StatusGate::new(true);
    assert!(gate.ingest(list).is_none(), "changes should buffer while not ready");

    let refreshed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let refreshed_clone = refreshed.clone();
    let mut ready = DeployStatus::not_ready();
    ready.deploy = "Complete".to_owned();
    ready.status_check = "Succeeded".to_owned();
    ready.recompute_ready();

    let flushed = gate
        .observe_status(ready, dir.path(), || async move {
            refreshed_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await;

    assert!(refreshed.load(std::sync::atomic::Ordering::SeqCst));
    let flushed = flushed.expect("buffered changes should flush on ready transition");
    assert_eq!(flushed.modified().len(), 1);
}

#[tokio::test]
async fn gateway_merges_two_providers_into_one_snapshot() {
    let mut gateway = Gateway::new(15);
    let handle = gateway.handle();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();

    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    gateway.subscribe(move |snapshot| {
        *seen_clone.lock().unwrap() = Some(flatten(snapshot));
    });

    let runner = tokio::spawn(async move { gateway.run(run_cancel).await });

    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "fs-file.txt", b"from fs");
    touch(dir.path(), "vcs-file.txt", b"from vcs");
    handle.feed("fs", change_list_touch(dir.path(), "fs-file.txt"));
    handle.feed("vcs", change_list_touch(dir.path(), "vcs-file.txt"));

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    cancel.cancel();
    runner.await.unwrap();

    let merged = seen.lock().unwrap().clone().expect("gateway should have fired");
    assert_eq!(merged.modified().len(), 2);
    assert!(merged.modified().contains_key(&HostPath::new("fs-file.txt")));
    assert!(merged.modified().contains_key(&HostPath::new("vcs-file.txt")));
}
