use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{DownloadError, Result};
use crate::state::Part;
use crate::utils::{checkpoint_path, part_path};

/// Concatenates the partial files of `parts`, in the order given, into
/// `<save_dir>/<filename>`. Callers sort by index first.
pub async fn merge_parts(save_dir: &Path, filename: &str, parts: &[Part]) -> Result<PathBuf> {
    let target = save_dir.join(filename);
    let mut to = File::create(&target)
        .await
        .map_err(|e| DownloadError::fs("create output file", &target, e))?;

    for part in parts {
        let source = part_path(save_dir, &part.filename, part.index);
        let mut from = File::open(&source)
            .await
            .map_err(|e| DownloadError::fs("open partial file", &source, e))?;

        let copied = tokio::io::copy(&mut from, &mut to)
            .await
            .map_err(|e| DownloadError::fs("append partial file", &source, e))?;
        if copied != part.size() {
            return Err(DownloadError::fs(
                "append partial file",
                &source,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("holds {} bytes, part {} needs {}", copied, part.index, part.size()),
                ),
            ));
        }
        debug!(part = part.index, bytes = copied, "merged part");
    }

    to.flush()
        .await
        .map_err(|e| DownloadError::fs("flush output file", &target, e))?;
    Ok(target)
}

/// Removes every partial file and the checkpoint. Only called once the merged
/// file is in place.
pub async fn clean(save_dir: &Path, filename: &str, parts: &[Part]) -> Result<()> {
    for part in parts {
        remove_if_present(&part_path(save_dir, &part.filename, part.index)).await?;
    }
    remove_if_present(&checkpoint_path(save_dir, filename)).await
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::fs("remove", path, e)),
    }
}
