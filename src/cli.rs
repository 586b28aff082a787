use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::config::{default_workers, DownloadConfig, DEFAULT_CHUNK_SIZE, MAX_WORKERS};

#[derive(Parser, Debug)]
#[command(author, version, about = "Segmented, resumable HTTP downloader", long_about = None)]
pub struct Args {
    /// URL of the resource to download
    #[arg(index = 1, value_parser = parse_url)]
    pub url: String,

    /// Directory for the downloaded file, its parts and checkpoint (created if missing)
    #[arg(short = 'd', long = "save-dir")]
    pub save_dir: PathBuf,

    /// Number of concurrent range requests (defaults to number of logical CPUs)
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers() as u16,
        value_parser = clap::value_parser!(u16).range(1..=MAX_WORKERS as i64)
    )]
    pub workers: u16,

    /// Continue from the last checkpoint if there is one
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub resume: bool,

    /// Bytes read between two cancellation checks
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE as u32, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: u32,

    /// Expected SHA-256 of the complete file (hex)
    #[arg(long, value_parser = parse_sha256)]
    pub sha256: Option<String>,

    /// Hide per-part progress bars
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Args {
    pub fn into_config(self) -> DownloadConfig {
        DownloadConfig {
            workers: self.workers as usize,
            resume: self.resume,
            chunk_size: self.chunk_size as usize,
            expected_sha256: self.sha256,
            show_progress: !self.quiet,
            ..DownloadConfig::new(self.url, self.save_dir)
        }
    }
}

fn parse_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("unsupported scheme {:?}", other)),
    }
}

fn parse_sha256(value: &str) -> Result<String, String> {
    let bytes = hex::decode(value.trim()).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    Ok(value.trim().to_ascii_lowercase())
}
