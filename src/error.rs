use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("metadata probe for {url} failed: {reason}")]
    Metadata { url: String, reason: String },

    #[error("[{}] range fetch failed: {reason}", .path.display())]
    Network { path: PathBuf, reason: String },

    #[error("[{}] {op} failed: {source}", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint {} is corrupt: {reason}", .path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("part worker did not finish: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl DownloadError {
    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        DownloadError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn network(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DownloadError::Network {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
