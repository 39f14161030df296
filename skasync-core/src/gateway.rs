//! Component G: the aggregation gateway.
//!
//! Grounded on `original_source/pkg/filemon/gateway.go`: every provider
//! unions its change list into a per-provider slot of a shared buffer and
//! resets one shared debounce timer to the full window; whichever provider
//! fires last decides the deadline. On fire the whole buffer is swapped out
//! and handed to every subscriber synchronously — subscribers are expected
//! to do their own dispatch if they need to do real work.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skasync_model::ChangeList;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Subscriber = Box<dyn Fn(&BTreeMap<String, ChangeList>) + Send + Sync>;

/// Merges however many change-list providers (filesystem watcher, VCS-HEAD
/// monitor, ...) behind one debounce window.
pub struct Gateway {
    debounce_ms: u64,
    buffer: Arc<Mutex<BTreeMap<String, ChangeList>>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    reset_tx: mpsc::Sender<()>,
    reset_rx: Option<mpsc::Receiver<()>>,
}

impl Gateway {
    pub fn new(debounce_ms: u64) -> Self {
        let (reset_tx, reset_rx) = mpsc::channel(64);
        Self {
            debounce_ms,
            buffer: Arc::new(Mutex::new(BTreeMap::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            reset_tx,
            reset_rx: Some(reset_rx),
        }
    }

    /// Register a callback invoked with the full per-provider snapshot on
    /// every debounce fire. Must not block.
    pub fn subscribe<F>(&self, cb: F)
    where
        F: Fn(&BTreeMap<String, ChangeList>) + Send + Sync + 'static,
    {
        self.subscribers.lock().unwrap().push(Box::new(cb));
    }

    /// Feed one provider's output into the gateway. `name` identifies the
    /// provider slot; repeated calls union into the existing slot rather
    /// than overwriting it, so a provider's own unflushed backlog survives
    /// across calls between debounce fires.
    pub fn feed(&self, name: &str, list: ChangeList) {
        {
            let mut buffer = self.buffer.lock().unwrap();
            let merged = match buffer.get(name) {
                Some(existing) => list.union(existing),
                None => list,
            };
            buffer.insert(name.to_owned(), merged);
        }
        let _ = self.reset_tx.try_send(());
    }

    /// A clonable handle providers can use to call [`Gateway::feed`] from
    /// their own tasks without holding a reference to the gateway itself.
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            buffer: self.buffer.clone(),
            reset_tx: self.reset_tx.clone(),
        }
    }

    /// Run the debounce loop until `cancel` fires. In-flight subscriber
    /// callbacks always complete before the loop exits.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut reset_rx = self.reset_rx.take().expect("Gateway::run called twice");
        let mut timer: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                signal = reset_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    timer = Some(Box::pin(tokio::time::sleep(Duration::from_millis(self.debounce_ms))));
                }
                _ = wait(&mut timer), if timer.is_some() => {
                    timer = None;
                    let snapshot = std::mem::take(&mut *self.buffer.lock().unwrap());
                    if snapshot.is_empty() {
                        continue;
                    }
                    for cb in self.subscribers.lock().unwrap().iter() {
                        cb(&snapshot);
                    }
                }
            }
        }
    }
}

async fn wait(timer: &mut Option<std::pin::Pin<Box<tokio::time::Sleep>>>) {
    if let Some(t) = timer.as_mut() {
        t.await;
    }
}

/// A cheap-to-clone feed handle, used by provider tasks spawned separately
/// from the `Gateway` itself.
#[derive(Clone)]
pub struct GatewayHandle {
    buffer: Arc<Mutex<BTreeMap<String, ChangeList>>>,
    reset_tx: mpsc::Sender<()>,
}

impl GatewayHandle {
    pub fn feed(&self, name: &str, list: ChangeList) {
        {
            let mut buffer = self.buffer.lock().unwrap();
            let merged = match buffer.get(name) {
                Some(existing) => list.union(existing),
                None => list,
            };
            buffer.insert(name.to_owned(), merged);
        }
        let _ = self.reset_tx.try_send(());
    }
}

/// Flatten a gateway snapshot into a single [`ChangeList`], mirroring
/// `GatewayResultToChangeList`. No cross-provider dedup is attempted here;
/// downstream consumers read through `modified_and_added()`/`deleted()`.
pub fn flatten(snapshot: &BTreeMap<String, ChangeList>) -> ChangeList {
    let mut out = ChangeList::new();
    for list in snapshot.values() {
        out = out.union(list);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skasync_model::{FileInfo, HostPath};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    #[tokio::test]
    async fn fires_once_after_two_providers_settle() {
        let mut gateway = Gateway::new(20);
        let fire_count = Arc::new(AtomicUsize::new(0));
        let seen = fire_count.clone();
        gateway.subscribe(move |snapshot| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(snapshot.len(), 2);
        });

        let cancel = CancellationToken::new();
        let handle = gateway.handle();
        let run_cancel = cancel.clone();
        let runner = tokio::spawn(async move {
            gateway.run(run_cancel).await;
        });

        let mut a = ChangeList::new();
        a.add_modified(HostPath::new("a.txt"), FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644));
        handle.feed("fs", a);

        let mut b = ChangeList::new();
        b.add_modified(HostPath::new("b.txt"), FileInfo::regular(1, SystemTime::UNIX_EPOCH, 0o644));
        handle.feed("vcs", b);

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        runner.await.unwrap();

        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
    }
}
