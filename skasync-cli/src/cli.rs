//! Argument parsing, mirroring `original_source/cmd/skasync/skasync.go`'s
//! two modes (`RunWatcher`/`RunSync`) plus `config.go`'s `flagsConfig`
//! (`-c`, `--context`, `--ns`), expressed as `clap` subcommands instead of
//! a watcher/sync mode flag.

use clap::{Parser, Subcommand, ValueEnum};
use skasync_config::Flags;

#[derive(Debug, Parser)]
#[command(name = "skasync", version, about = "Dev-loop file synchronizer for Kubernetes")]
pub struct Cli {
    #[command(flatten)]
    pub flags: Flags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the long-lived watch/sync pipeline and its HTTP control surface.
    Watcher,
    /// One-shot sync of specific paths into one or more targets.
    Sync {
        /// Sync direction. Only `in` (workstation -> pod) is implemented.
        direction: SyncDirection,
        /// `all`, or a comma-separated list of target tags.
        targets: String,
        /// Comma-separated list of workspace-relative paths to sync.
        paths: String,
    },
    /// Print the binary's version and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncDirection {
    In,
    Out,
}
