//! Signal handling, replacing `original_source/cmd/skasync/watcher.go`'s
//! `signal.Notify(sigChan, syscall.SIGTERM, syscall.SIGQUIT, syscall.SIGINT)`
//! + `select`. A single [`CancellationToken`] is cancelled on the first of
//! SIGINT, SIGTERM, or SIGQUIT (SIGQUIT is Unix-only; other platforms fall
//! back to Ctrl-C alone) and threaded through every long-running task.

use tokio_util::sync::CancellationToken;

/// Spawn a task that cancels `token` on the first shutdown signal and
/// returns immediately.
pub fn install(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("received stop signal");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
