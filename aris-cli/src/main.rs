//! ABOUTME: Main entry point for the `aris` CLI
//! ABOUTME: Parse args, set up tracing, load config once, build Context, dispatch, map to exit code

mod cli;
mod commands;
mod context;

use anyhow::Result;
use aris_config::ArisConfig;
use clap::Parser;
use cli::Cli;
use commands::execute_command;
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let mut config = ArisConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }

    let context = Context::build(config)?;
    let exit_code = execute_command(cli, context).await?;
    std::process::exit(exit_code);
}

/// Tracing goes to stderr so stdout stays clean for `--output json` piping.
/// Priority: `RUST_LOG` env var, then `-v`/`-vv`/`-vvv` verbosity count.
fn setup_tracing(verbosity: u8) {
    use std::io;
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(false)
            .init();
        return;
    }

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
