use std::path::{Path, PathBuf};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use tokio::fs::File;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checkpoint;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::hashing::calculate_hash;
use crate::merge::{clean, merge_parts};
use crate::probe::{probe, ResourceInfo};
use crate::state::{all_completed, split, validate_partition, Part};
use crate::utils::{checkpoint_path, part_path};
use crate::worker::{PartReport, PartStatus, PartWorker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every part arrived and the merged file is at this path.
    Completed(PathBuf),
    /// Stopped early; the checkpoint on disk records how far each part got.
    Interrupted,
}

/// Drives one download job: probe, plan, fetch all parts concurrently,
/// persist the checkpoint, and merge once everything is in.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
    multi_progress: MultiProgress,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("rangedl/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        let multi_progress = MultiProgress::new();
        if config.show_progress {
            multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        } else {
            multi_progress.set_draw_target(ProgressDrawTarget::hidden());
        }

        Self {
            client,
            config,
            multi_progress,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunOutcome> {
        let save_dir = self.config.save_dir.as_path();
        let info = probe(&self.client, &self.config.resource_url).await?;

        let mut workers = self.config.workers;
        if !info.accepts_ranges && workers > 1 {
            info!("range requests not supported, falling back to a single worker");
            workers = 1;
        }

        let checkpoint = checkpoint_path(save_dir, &info.filename);
        if info.total_size == 0 {
            return self.finish_empty(save_dir, &info.filename).await;
        }

        let parts = self.plan(&info, workers, &checkpoint).await?;
        let reports = self.fetch_all(parts, &shutdown).await?;

        let mut parts: Vec<Part> = reports.into_iter().map(|r| r.part).collect();
        parts.sort_by_key(|p| p.index);
        checkpoint::save(&checkpoint, &parts).await?;
        debug!(path = %checkpoint.display(), "checkpoint saved");

        if !all_completed(&parts) {
            return Ok(RunOutcome::Interrupted);
        }

        let target = merge_parts(save_dir, &info.filename, &parts).await?;
        if let Some(expected) = &self.config.expected_sha256 {
            let actual = calculate_hash(&target).await?;
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(DownloadError::ChecksumMismatch {
                    path: target,
                    expected: expected.clone(),
                    actual,
                });
            }
            info!(sha256 = %actual, "checksum verified");
        }
        clean(save_dir, &info.filename, &parts).await?;

        Ok(RunOutcome::Completed(target))
    }

    /// Resumes from the checkpoint when asked to and one exists, otherwise
    /// starts from a fresh split.
    async fn plan(&self, info: &ResourceInfo, workers: usize, checkpoint: &Path) -> Result<Vec<Part>> {
        if self.config.resume && checkpoint::exists(checkpoint).await? {
            let parts = checkpoint::load(checkpoint).await?;
            validate_partition(&parts, info.total_size, &info.filename).map_err(|reason| {
                DownloadError::CheckpointCorrupt {
                    path: checkpoint.to_path_buf(),
                    reason,
                }
            })?;

            let done: u64 = parts.iter().map(|p| p.read_length).sum();
            info!(
                parts = parts.len(),
                done,
                total = info.total_size,
                "resuming from checkpoint"
            );
            return Ok(parts);
        }

        let parts = split(info.total_size, workers, &info.filename);
        info!(parts = parts.len(), total = info.total_size, "starting fresh download");
        Ok(parts)
    }

    /// Launches one worker per part and waits for all of them. An interrupt
    /// cancels the workers but keeps draining; a worker error aborts the rest.
    async fn fetch_all(&self, parts: Vec<Part>, shutdown: &CancellationToken) -> Result<Vec<PartReport>> {
        let cancel = shutdown.child_token();
        let mut tasks = JoinSet::new();

        for part in parts {
            let worker = PartWorker::new(
                self.client.clone(),
                self.config.resource_url.clone(),
                self.config.save_dir.clone(),
                self.config.chunk_size,
                cancel.clone(),
                self.part_progress(&part),
            );
            tasks.spawn(worker.run(part));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        let mut interrupted = false;
        loop {
            tokio::select! {
                _ = shutdown.cancelled(), if !interrupted => {
                    interrupted = true;
                    info!("interrupt received, waiting for workers to stop");
                    cancel.cancel();
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(Ok(report))) => {
                        if report.status == PartStatus::Interrupted {
                            debug!(part = report.part.index, read = report.part.read_length, "part interrupted");
                        }
                        reports.push(report);
                    }
                    Some(Ok(Err(e))) => {
                        warn!("aborting remaining workers");
                        tasks.abort_all();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        tasks.abort_all();
                        return Err(DownloadError::Worker(e));
                    }
                    None => break,
                },
            }
        }
        Ok(reports)
    }

    fn part_progress(&self, part: &Part) -> ProgressBar {
        let pb = self.multi_progress.add(ProgressBar::new(part.size()));
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb.set_prefix(
            part_path(&self.config.save_dir, &part.filename, part.index)
                .display()
                .to_string(),
        );
        pb
    }

    async fn finish_empty(&self, save_dir: &Path, filename: &str) -> Result<RunOutcome> {
        let target = save_dir.join(filename);
        File::create(&target)
            .await
            .map_err(|e| DownloadError::fs("create output file", &target, e))?;
        clean(save_dir, filename, &[]).await?;
        Ok(RunOutcome::Completed(target))
    }
}
