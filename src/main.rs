mod checkpoint;
mod cli;
mod commands;
mod config;
mod downloader;
mod error;
mod hashing;
mod merge;
mod probe;
mod state;
mod utils;
mod worker;

#[cfg(test)]
mod test_support;

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Args::parse().into_config();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async {
        let shutdown = CancellationToken::new();
        crate::commands::spawn_interrupt_listener(shutdown.clone());
        crate::commands::run_download(config, shutdown).await
    });

    // Interrupted runs exit cleanly; the checkpoint carries the progress.
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
