use std::path::{Path, PathBuf};

use clap::Args;

/// Global flags shared by every `skasync` subcommand, mirroring
/// `original_source/cmd/skasync/config.go`'s `flagsConfig` (`-c`,
/// `--context`, `--ns`).
#[derive(Debug, Clone, Default, Args)]
pub struct Flags {
    /// Path to the JSON config file, relative to the current directory
    /// unless absolute. Defaults to `skasync.config.json` in the current
    /// directory.
    #[arg(short = 'c', long = "config", env = "SKASYNC_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Cluster CLI context, used when the config file and environment
    /// leave it unset.
    #[arg(long = "context", env = "SKASYNC_CONTEXT")]
    pub context: Option<String>,

    /// Cluster CLI namespace, used when the config file and environment
    /// leave it unset.
    #[arg(long = "ns", env = "SKASYNC_NAMESPACE")]
    pub namespace: Option<String>,
}

impl Flags {
    /// Resolve the config file path against `current_dir`, applying the
    /// same `skasync.config.json` default the original uses.
    pub fn resolved_config_path(&self, current_dir: &Path) -> PathBuf {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("skasync.config.json"));
        if path.is_absolute() {
            path
        } else {
            current_dir.join(path)
        }
    }
}
