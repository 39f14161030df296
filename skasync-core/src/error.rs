use std::path::PathBuf;

use thiserror::Error;

/// The pipeline's shared error enum: an `Io`/`Serialization` pass-through
/// pair plus domain-specific variants, used at the `skasync-core` boundary
/// and wrapped in `anyhow::Error` once it reaches the CLI binary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pass-through IO error (walk entries, archive reads, pipe writes).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Pass-through JSON (de)serialization error (deploy-status bodies).
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// An ignore-pattern file could not be compiled into a matcher.
    #[error("invalid ignore patterns in {path}: {source}")]
    IgnorePattern {
        /// The ignore file that failed to compile.
        path: PathBuf,
        /// The underlying `ignore` crate error.
        #[source]
        source: ignore::Error,
    },

    /// The target registry could not resolve one or more endpoints this
    /// round; retried on the next ready transition.
    #[error("failed to resolve {failed} of {total} endpoints")]
    Resolve {
        /// Endpoints that failed to resolve.
        failed: usize,
        /// Endpoints attempted.
        total: usize,
    },

    /// A cluster CLI subprocess failed.
    #[error(transparent)]
    ClusterCli(#[from] skasync_contracts::ClusterCliError),

    /// The deploy-status feed could not be reached or parsed.
    #[error(transparent)]
    DeployStatus(#[from] skasync_contracts::DeployStatusError),

    /// The VCS-HEAD monitor's pointer file was missing at startup.
    #[error("git HEAD not found under {root}")]
    GitHeadMissing {
        /// The root directory that was checked.
        root: PathBuf,
    },

    /// The pipeline was asked to shut down mid-operation.
    #[error("cancelled")]
    Cancelled,
}

/// Convenience alias used throughout `skasync-core`.
pub type Result<T> = std::result::Result<T, SyncError>;
