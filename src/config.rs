use std::path::PathBuf;

/// Upper bound on concurrent range workers for a single job.
pub const MAX_WORKERS: usize = 100;

/// Bytes read from the response body between two cancellation checks.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Everything a single download run needs. Built once by the CLI layer and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub resource_url: String,
    pub save_dir: PathBuf,
    pub workers: usize,
    pub resume: bool,
    pub chunk_size: usize,
    pub expected_sha256: Option<String>,
    pub show_progress: bool,
}

impl DownloadConfig {
    pub fn new(resource_url: impl Into<String>, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_url: resource_url.into(),
            save_dir: save_dir.into(),
            workers: default_workers(),
            resume: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            expected_sha256: None,
            show_progress: true,
        }
    }
}

pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}
