use std::path::Path;

use tokio::fs;

use crate::error::{DownloadError, Result};
use crate::state::Part;

pub async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| DownloadError::fs("stat checkpoint", path, e))
}

/// Writes the whole part set to `path`, replacing whatever was there.
pub async fn save(path: &Path, parts: &[Part]) -> Result<()> {
    let content = serde_json::to_string(parts)?;
    fs::write(path, content)
        .await
        .map_err(|e| DownloadError::fs("write checkpoint", path, e))
}

pub async fn load(path: &Path) -> Result<Vec<Part>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| DownloadError::CheckpointCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    serde_json::from_str(&content).map_err(|e| DownloadError::CheckpointCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
