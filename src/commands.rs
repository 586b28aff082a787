use anyhow::{Context, Result};
use std::time::Instant;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DownloadConfig;
use crate::downloader::{Downloader, RunOutcome};

pub async fn run_download(config: DownloadConfig, shutdown: CancellationToken) -> Result<RunOutcome> {
    fs::create_dir_all(&config.save_dir)
        .await
        .with_context(|| format!("Failed to create save directory {:?}", config.save_dir))?;

    info!(
        url = %config.resource_url,
        save_dir = %config.save_dir.display(),
        workers = config.workers,
        resume = config.resume,
        "starting download"
    );

    let started = Instant::now();
    let url = config.resource_url.clone();
    let result = Downloader::new(config).run(shutdown).await;
    info!("finished in {:.2} s", started.elapsed().as_secs_f64());

    let outcome = result.with_context(|| format!("Failed to download {}", url))?;
    match &outcome {
        RunOutcome::Completed(path) => info!(path = %path.display(), "done"),
        RunOutcome::Interrupted => info!("interrupted, run again to resume"),
    }
    Ok(outcome)
}

/// Cancels `shutdown` on the first Ctrl-C, or SIGTERM/SIGHUP/SIGQUIT on Unix.
pub fn spawn_interrupt_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        shutdown.cancel();
    });
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
        signal(SignalKind::quit()),
    );
    let (mut term, mut hup, mut quit) = match handlers {
        (Ok(term), Ok(hup), Ok(quit)) => (term, hup, quit),
        _ => {
            warn!("could not install signal handlers, only Ctrl-C will interrupt");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = term.recv() => {}
        _ = hup.recv() => {}
        _ = quit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    ctrl_c().await;
}
