use std::path::PathBuf;

use thiserror::Error;

/// Configuration load/validation failures. All are fatal — the original
/// simply `log.Fatal`s on any of these (`original_source/cmd/skasync/config.go`);
/// here the caller gets a typed error to log and exit on.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file at all.
    #[error("could not read config file {path}: {source}")]
    ReadFile {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Config file contents were not valid JSON for this shape.
    #[error("could not parse config file {path}: {source}")]
    ParseFile {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// `rootDir` does not exist on disk.
    #[error("root dir \"{path}\" does not exist")]
    RootDirMissing {
        /// The path that was checked.
        path: PathBuf,
    },
    /// An artifact's resolved dockerfile/ignore-file directory is missing.
    #[error("artifact \"{artifact}\" dockerfile dir \"{path}\" does not exist")]
    DockerfileDirMissing {
        /// Artifact id.
        artifact: String,
        /// The path that was checked.
        path: PathBuf,
    },
    /// Neither env, flags, nor file supplied a cluster context.
    #[error("undefined context")]
    MissingContext,
    /// Neither env, flags, nor file supplied a namespace.
    #[error("undefined namespace")]
    MissingNamespace,
    /// No sync endpoints configured.
    #[error("undefined endpoints")]
    NoEndpoints,
    /// An artifact entry has no image name.
    #[error("artifact \"{id}\" requires an image name")]
    MissingArtifactImage {
        /// Artifact id.
        id: String,
    },
    /// An endpoint entry has no label selector.
    #[error("endpoint \"{tag}\" requires a pod selector")]
    MissingSelector {
        /// Endpoint tag.
        tag: String,
    },
    /// An endpoint entry has no container name.
    #[error("endpoint \"{tag}\" requires a container name")]
    MissingContainer {
        /// Endpoint tag.
        tag: String,
    },
    /// An endpoint references an artifact id that isn't configured.
    #[error("endpoint \"{tag}\" references unknown artifact \"{artifact}\"")]
    UnknownArtifact {
        /// Endpoint tag.
        tag: String,
        /// The artifact id that could not be resolved.
        artifact: String,
    },
    /// An endpoint's container root is empty. Resolves SPEC_FULL.md's Open
    /// Question (b): a non-empty `containerRoot` is enforced at load time
    /// rather than left to fail later during path translation.
    #[error("endpoint \"{tag}\" requires a non-empty containerRoot")]
    EmptyContainerRoot {
        /// Endpoint tag.
        tag: String,
    },
}
