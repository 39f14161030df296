//! Layered configuration loading for skasync: built-in defaults, then
//! environment variables, then CLI flags, then the JSON config file — the
//! same precedence as `original_source/cmd/skasync/config.go`'s
//! `LoadConfig` (`defaultConfig` → `readEnvs` → `readFlags` → `readFile`,
//! with flags backstopping any field the file left empty).

mod error;
mod flags;

pub use error::ConfigError;
pub use flags::Flags;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One configured build artifact: an image root directory plus where its
/// ignore file should be resolved from. Mirrors
/// `original_source/pkg/docker/artifact.go`'s `ArtifactConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Image name this artifact builds, used to correlate with the deploy
    /// status feed's per-artifact state.
    pub image: String,
    /// Absolute path in the workstation tree this artifact's sources live
    /// under.
    #[serde(rename = "rootDir")]
    pub root_dir: PathBuf,
    /// Directory to search for an ignore file, defaulting to `root_dir`
    /// when empty.
    #[serde(rename = "dockerfileDir", default)]
    pub dockerfile_dir: PathBuf,
}

/// One configured sync target: a tag, the pod it resolves to via a label
/// selector, which container in that pod, and which artifact it mirrors.
/// Mirrors `original_source/pkg/k8s/endpoint.go`'s `EndpointConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The `ArtifactConfig` id this endpoint mirrors.
    pub artifact: String,
    /// Label selector used to resolve the pod name.
    pub selector: String,
    /// Container name within the resolved pod.
    pub container: String,
    /// The directory inside the container this artifact is mounted at.
    #[serde(rename = "containerRoot")]
    pub container_root: PathBuf,
}

/// Aggregation/debounce tuning, mirroring
/// `original_source/pkg/sync/config.go`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Shared debounce window in milliseconds used by the filesystem
    /// watcher and the aggregation gateway.
    #[serde(rename = "debounceMs", default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Conservative argv byte budget for a single `rm -rf --` invocation,
    /// resolving SPEC_FULL.md's Open Question (a).
    #[serde(rename = "rmArgvBudgetBytes", default = "default_rm_argv_budget")]
    pub rm_argv_budget_bytes: usize,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_rm_argv_budget() -> usize {
    128 * 1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            rm_argv_budget_bytes: default_rm_argv_budget(),
        }
    }
}

/// Deploy-status probe settings, mirroring
/// `original_source/pkg/skaffold/config.go`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// `host:port` of the deploy controller's status feed.
    #[serde(default = "default_status_addr")]
    pub addr: String,
    /// Whether the status gate (component I) should hold changes behind
    /// deploy readiness at all. When `false`, changes pass straight
    /// through, same as the original's `isWatching` flag.
    #[serde(rename = "watchingDeployStatus", default)]
    pub watching_deploy_status: bool,
}

fn default_status_addr() -> String {
    "127.0.0.1:50052".to_owned()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            addr: default_status_addr(),
            watching_deploy_status: false,
        }
    }
}

/// HTTP control-surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port the control surface listens on, loopback-only.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    9876
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// The full, resolved configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Cluster CLI context (`kubectl --context`).
    #[serde(default)]
    pub context: String,
    /// Cluster CLI namespace (`kubectl --namespace`).
    #[serde(default)]
    pub namespace: String,
    /// Root directory on the workstation being watched.
    #[serde(rename = "rootDir", default)]
    pub root_dir: PathBuf,
    /// Opt-in VCS-HEAD monitor root; absent means component F is disabled.
    #[serde(rename = "vcsRootDir", default)]
    pub vcs_root_dir: Option<PathBuf>,
    /// Configured build artifacts, keyed by artifact id.
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactConfig>,
    /// Configured sync endpoints, keyed by tag.
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
    /// Aggregation/debounce tuning.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Deploy-status probe settings.
    #[serde(default)]
    pub status: StatusConfig,
    /// HTTP control-surface settings.
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    fn defaults(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            ..Self::default()
        }
    }

    /// Layered load: defaults, then `SKASYNC_*` env overrides, then CLI
    /// flags, then the JSON config file (flags backstop any field the file
    /// left empty, same order as the original).
    pub fn load(flags: &Flags, current_dir: &Path) -> Result<Self, ConfigError> {
        let mut cfg = Self::defaults(current_dir.to_path_buf());

        cfg.apply_env()?;

        let config_path = flags.resolved_config_path(current_dir);
        if config_path.exists() {
            cfg.apply_file(&config_path)?;
        }

        if cfg.context.is_empty() {
            cfg.context = flags.context.clone().unwrap_or_default();
        }
        if cfg.namespace.is_empty() {
            cfg.namespace = flags.namespace.clone().unwrap_or_default();
        }

        cfg.validate()?;

        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("SKASYNC_CONTEXT") {
            if !v.is_empty() {
                self.context = v;
            }
        }
        if let Ok(v) = std::env::var("SKASYNC_NAMESPACE") {
            if !v.is_empty() {
                self.namespace = v;
            }
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let mut file_cfg: Config = serde_json::from_str(&data)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;

        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if file_cfg.root_dir.as_os_str().is_empty() {
            file_cfg.root_dir = self.root_dir.clone();
        } else if file_cfg.root_dir.is_relative() {
            file_cfg.root_dir = config_dir.join(&file_cfg.root_dir);
        }
        if !file_cfg.root_dir.exists() {
            return Err(ConfigError::RootDirMissing {
                path: file_cfg.root_dir,
            });
        }

        for (id, artifact) in file_cfg.artifacts.iter_mut() {
            if artifact.dockerfile_dir.as_os_str().is_empty() {
                artifact.dockerfile_dir = file_cfg.root_dir.clone();
            } else if artifact.dockerfile_dir.is_relative() {
                artifact.dockerfile_dir = config_dir.join(&artifact.dockerfile_dir);
            }
            if !artifact.dockerfile_dir.exists() {
                return Err(ConfigError::DockerfileDirMissing {
                    artifact: id.clone(),
                    path: artifact.dockerfile_dir.clone(),
                });
            }
        }

        *self = Config {
            context: if file_cfg.context.is_empty() { self.context.clone() } else { file_cfg.context },
            namespace: if file_cfg.namespace.is_empty() { self.namespace.clone() } else { file_cfg.namespace },
            ..file_cfg
        };

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.is_empty() {
            return Err(ConfigError::MissingContext);
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        for (id, artifact) in &self.artifacts {
            if artifact.image.is_empty() {
                return Err(ConfigError::MissingArtifactImage { id: id.clone() });
            }
        }
        for (tag, endpoint) in &self.endpoints {
            if endpoint.selector.is_empty() {
                return Err(ConfigError::MissingSelector { tag: tag.clone() });
            }
            if endpoint.container.is_empty() {
                return Err(ConfigError::MissingContainer { tag: tag.clone() });
            }
            if !self.artifacts.contains_key(&endpoint.artifact) {
                return Err(ConfigError::UnknownArtifact {
                    tag: tag.clone(),
                    artifact: endpoint.artifact.clone(),
                });
            }
            if endpoint.container_root.as_os_str().is_empty() {
                return Err(ConfigError::EmptyContainerRoot { tag: tag.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_container_root() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            "app".to_owned(),
            ArtifactConfig {
                image: "app:dev".to_owned(),
                root_dir: PathBuf::from("/tmp"),
                dockerfile_dir: PathBuf::from("/tmp"),
            },
        );
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            "app".to_owned(),
            EndpointConfig {
                artifact: "app".to_owned(),
                selector: "app=app".to_owned(),
                container: "app".to_owned(),
                container_root: PathBuf::new(),
            },
        );
        let cfg = Config {
            context: "kind".to_owned(),
            namespace: "default".to_owned(),
            artifacts,
            endpoints,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EmptyContainerRoot { .. })
        ));
    }
}
