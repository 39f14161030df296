//! Component D: the archive builder.
//!
//! Grounded on `original_source/pkg/filesystem/tar.go`'s
//! `CreateMappedTar`/`addFileToTar`, translated from `archive/tar` +
//! `io.Pipe()` into `async-tar`'s `Builder` writing into whatever
//! `AsyncWrite` the caller hands it (a `tokio::process::Child`'s stdin in
//! `skasync-cli`, a `tokio::io::DuplexStream` in tests) — the async-Rust
//! equivalent of the original's pipe-into-subprocess-stdin shape.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_tar::{Builder, EntryType, Header};
use skasync_model::ProgressSample;
use tokio::sync::mpsc;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

use crate::error::{Result, SyncError};

/// Build a tar stream from a host-path → container-entry-name map, writing
/// into `sink` and reporting a [`ProgressSample`] after every entry on
/// `progress` (when given). Aborts on the first error, leaving the sink
/// partially written — the caller is expected to close/drop the sink on
/// `Err`, which the reading end (a `tar xmf -` subprocess) observes as a
/// truncated stream.
pub async fn build_archive<W>(
    sink: W,
    entries: &BTreeMap<PathBuf, String>,
    progress: Option<mpsc::Sender<ProgressSample>>,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let mut builder = Builder::new(sink.compat_write());
    let all_files = entries.len() as u64;
    let mut sent_files: u64 = 0;
    let mut bytes_sent: u64 = 0;

    for (host_path, dst) in entries {
        let meta = tokio::fs::symlink_metadata(host_path).await?;
        if is_socket(&meta) {
            continue;
        }

        let mut header = Header::new_gnu();
        header.set_mtime(
            meta.modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );

        if meta.file_type().is_symlink() {
            let target = tokio::fs::read_link(host_path).await?;
            if target.is_absolute() {
                tracing::warn!(path = %host_path.display(), "skipping absolute symlink target in archive");
                continue;
            }
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(normalize_mode(0o777));
            header.set_size(0);
            builder.append_link(&mut header, dst, &target).await?;
        } else {
            header.set_mode(normalize_mode(file_mode(&meta)));
            header.set_size(meta.len());
            let file = tokio::fs::File::open(host_path).await?;
            builder.append_data(&mut header, dst, file.compat()).await?;
            bytes_sent += meta.len();
        }

        sent_files += 1;
        if let Some(tx) = &progress {
            let _ = tx
                .send(ProgressSample {
                    all_files,
                    sent_files,
                    bytes_sent,
                })
                .await;
        }
    }

    builder.finish().await?;
    Ok(())
}

#[cfg(unix)]
fn is_socket(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_socket()
}

#[cfg(not(unix))]
fn is_socket(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}

/// Non-POSIX hosts (Windows) can't report a meaningful mode bit, so the
/// original forces everything `+x` and masks to `0755`
/// (`original_source/pkg/filesystem/tar.go`'s `chmodTarEntry`, itself
/// copied from moby's `archive_windows.go`). Ported verbatim rather than
/// reinvented, since this is an intentional compatibility shim, not an
/// algorithmic choice.
fn normalize_mode(mode: u32) -> u32 {
    if cfg!(windows) {
        let perm_part = (mode & 0o777) | 0o111;
        let perm_part = perm_part & 0o755;
        let no_perm_part = mode & !0o777;
        no_perm_part | perm_part
    } else {
        mode
    }
}

/// Build a tar archive fully into memory, for callers (the fan-out
/// synchronizer, component K) whose downstream sink — `ClusterCli::
/// exec_tar_extract` — takes a complete byte buffer rather than a live pipe.
/// Internally still streams through [`build_archive`] via a duplex pipe, so
/// the per-entry logic has exactly one implementation.
pub async fn build_archive_bytes(
    entries: &BTreeMap<PathBuf, String>,
    progress: Option<mpsc::Sender<ProgressSample>>,
) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    let entries = entries.clone();
    let writer_task = tokio::spawn(async move { build_archive(writer, &entries, progress).await });

    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    writer_task
        .await
        .map_err(|err| SyncError::Io(std::io::Error::other(err)))??;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn builds_archive_for_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"hello").unwrap();

        let mut entries = BTreeMap::new();
        entries.insert(file_path, "a.txt".to_owned());

        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let sink = tokio_test_sink(cursor);
            build_archive(sink, &entries, None).await.unwrap();
        }
        assert!(!buf.is_empty());
    }

    fn tokio_test_sink(cursor: std::io::Cursor<&mut Vec<u8>>) -> impl tokio::io::AsyncWrite + Unpin + Send + '_ {
        TokioCursorWriter(cursor)
    }

    struct TokioCursorWriter<'a>(std::io::Cursor<&'a mut Vec<u8>>);

    impl<'a> tokio::io::AsyncWrite for TokioCursorWriter<'a> {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            use std::io::Write;
            std::task::Poll::Ready(self.0.write(buf))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }
}
