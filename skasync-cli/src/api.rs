//! The HTTP control surface, grounded on `original_source/cmd/skasync/api/
//! {api.go,debug.go,sync.go}`: a small JSON API for triggering a manual sync
//! or inspecting the last few debounce snapshots the gateway produced. The
//! original always answers with HTTP 200 and an `{"error": ...}` body on
//! failure; this port keeps that convention for the routes it shares and
//! otherwise falls back to axum's normal status-code handling.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{Path as AxumPath, State};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use skasync_core::Synchronizer;
use skasync_model::ChangeList;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::pipeline::change_list_for_paths;

const MAX_SNAPSHOTS: usize = 50;

struct DebugStoreInner {
    next_id: u64,
    snapshots: BTreeMap<u64, BTreeMap<String, ChangeList>>,
}

/// A capped, oldest-evicted ring of recent gateway snapshots, backing
/// `GET /debug/change-list/:id`. Mirrors `DebugController`'s in-memory
/// snapshot map, minus the original's unbounded growth.
#[derive(Clone)]
pub struct DebugStore(Arc<Mutex<DebugStoreInner>>);

impl DebugStore {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(DebugStoreInner {
            next_id: 1,
            snapshots: BTreeMap::new(),
        })))
    }

    pub fn push(&self, snapshot: BTreeMap<String, ChangeList>) -> u64 {
        let mut inner = self.0.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.snapshots.insert(id, snapshot);
        while inner.snapshots.len() > MAX_SNAPSHOTS {
            let oldest = *inner.snapshots.keys().next().expect("non-empty");
            inner.snapshots.remove(&oldest);
        }
        id
    }

    pub fn get(&self, id: u64) -> Option<BTreeMap<String, ChangeList>> {
        self.0.lock().unwrap().snapshots.get(&id).cloned()
    }
}

impl Default for DebugStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub synchronizer: Arc<Synchronizer>,
    pub root_dir: PathBuf,
    pub debug_store: DebugStore,
}

#[derive(Debug, Deserialize)]
struct SyncPodRequest {
    tag: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct SyncAllRequest {
    path: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct ChangeListSummary {
    added: Vec<String>,
    modified: Vec<String>,
    deleted: Vec<String>,
}

impl From<&ChangeList> for ChangeListSummary {
    fn from(list: &ChangeList) -> Self {
        Self {
            added: list.added().keys().map(ToString::to_string).collect(),
            modified: list.modified().keys().map(ToString::to_string).collect(),
            deleted: list.deleted().keys().map(ToString::to_string).collect(),
        }
    }
}

async fn sync_in_pod(State(state): State<AppState>, Json(req): Json<SyncPodRequest>) -> impl IntoResponse {
    let tag = skasync_model::Tag::from(req.tag.as_str());
    let list = change_list_for_paths(&state.root_dir, &[req.path]);
    match state.synchronizer.sync_target_by_tag(&tag, &list).await {
        Some(_) => Json(StatusResponse { status: "OK" }).into_response(),
        None => Json(ErrorResponse {
            error: format!("target \"{}\" not found", req.tag),
        })
        .into_response(),
    }
}

async fn sync_in_all_pods(State(state): State<AppState>, Json(req): Json<SyncAllRequest>) -> impl IntoResponse {
    let list = change_list_for_paths(&state.root_dir, &[req.path]);
    state.synchronizer.sync_round(&list).await;
    Json(StatusResponse { status: "OK" })
}

async fn debug_change_list(State(state): State<AppState>, AxumPath(id): AxumPath<u64>) -> impl IntoResponse {
    match state.debug_store.get(id) {
        Some(snapshot) => {
            let out: BTreeMap<String, ChangeListSummary> =
                snapshot.iter().map(|(name, list)| (name.clone(), ChangeListSummary::from(list))).collect();
            Json(out).into_response()
        }
        None => Json(ErrorResponse {
            error: format!("no change list recorded for id {id}"),
        })
        .into_response(),
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync/in/pod", put(sync_in_pod))
        .route("/sync/in/allPods", put(sync_in_all_pods))
        .route("/debug/change-list/{id}", get(debug_change_list))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the control surface on `port` until `cancel` fires.
pub async fn serve(port: u16, state: AppState, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skasync_model::{FileInfo, HostPath};
    use std::time::SystemTime;

    #[test]
    fn debug_store_evicts_oldest_past_cap() {
        let store = DebugStore::new();
        for _ in 0..MAX_SNAPSHOTS + 5 {
            store.push(BTreeMap::new());
        }
        let inner = store.0.lock().unwrap();
        assert_eq!(inner.snapshots.len(), MAX_SNAPSHOTS);
    }

    #[test]
    fn change_list_summary_lists_every_bucket() {
        let mut list = ChangeList::new();
        list.add_modified(HostPath::new("a.txt"), FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644));
        let summary = ChangeListSummary::from(&list);
        assert_eq!(summary.modified, vec!["a.txt".to_owned()]);
    }
}
