//! The `skasync` binary entry point, mirroring `original_source/cmd/skasync/
//! skasync.go`'s `main()`: load config, then dispatch to the watcher loop or
//! a one-shot sync.

mod api;
mod cli;
mod pipeline;
mod shutdown;

use clap::Parser;
use cli::{Cli, Command};
use skasync_config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Version) {
        println!("skasync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let current_dir = std::env::current_dir()?;
    let config = Config::load(&cli.flags, &current_dir)?;

    match cli.command {
        Command::Watcher => pipeline::run_watcher(config).await,
        Command::Sync { direction, targets, paths } => pipeline::run_sync(config, direction, targets, paths).await,
        Command::Version => unreachable!("handled before runtime startup"),
    }
}
