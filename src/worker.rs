use std::io;
use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use indicatif::ProgressBar;
use reqwest::{header, Client, StatusCode};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DownloadError, Result};
use crate::state::Part;
use crate::utils::part_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStatus {
    Completed,
    Interrupted,
}

/// Terminal report of one worker: the part as it stands on disk.
#[derive(Debug, Clone)]
pub struct PartReport {
    pub part: Part,
    pub status: PartStatus,
}

impl PartReport {
    fn new(part: Part, status: PartStatus) -> Self {
        Self { part, status }
    }
}

/// Fetches the unread tail of one part into `<save_dir>/<filename>.part<index>`.
pub struct PartWorker {
    client: Client,
    url: String,
    save_dir: PathBuf,
    chunk_size: usize,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl PartWorker {
    pub fn new(
        client: Client,
        url: String,
        save_dir: PathBuf,
        chunk_size: usize,
        cancel: CancellationToken,
        progress: ProgressBar,
    ) -> Self {
        Self {
            client,
            url,
            save_dir,
            chunk_size: chunk_size.max(1),
            cancel,
            progress,
        }
    }

    pub async fn run(self, mut part: Part) -> Result<PartReport> {
        let path = part_path(&self.save_dir, &part.filename, part.index);
        self.progress.set_length(part.size());
        self.progress.set_position(part.read_length);

        if part.is_completed() {
            self.progress.finish();
            return Ok(PartReport::new(part, PartStatus::Completed));
        }
        if self.cancel.is_cancelled() {
            self.progress.abandon();
            return Ok(PartReport::new(part, PartStatus::Interrupted));
        }

        reconcile(&mut part, &path).await?;
        self.progress.set_position(part.read_length);

        debug!(part = part.index, range = %part.range_header(), "requesting range");
        let request = self
            .client
            .get(&self.url)
            .header(header::RANGE, part.range_header())
            .send();
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.progress.abandon();
                return Ok(PartReport::new(part, PartStatus::Interrupted));
            }
            response = request => response.map_err(|e| DownloadError::network(&path, e))?,
        };

        let mut truncate = false;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK if part.start == 0 => {
                // Whole body from byte 0; anything already on disk is redundant.
                if part.read_length > 0 {
                    warn!(part = part.index, "server ignored range request, restarting part");
                    part.read_length = 0;
                    self.progress.set_position(0);
                    truncate = true;
                }
            }
            StatusCode::OK => {
                return Err(DownloadError::network(
                    &path,
                    format!("server ignored range {}", part.range_header()),
                ));
            }
            status => {
                return Err(DownloadError::network(&path, format!("server answered {}", status)));
            }
        }

        let mut file = open_partial(&path, truncate).await?;
        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(Box::pin(body));
        let mut buffer = vec![0u8; self.chunk_size];
        let mut cancelled = false;

        loop {
            let n = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                n = reader.read(&mut buffer) => n.map_err(|e| DownloadError::network(&path, e))?,
            };
            if n == 0 {
                break;
            }

            let remaining = part.size() - part.read_length;
            if n as u64 > remaining {
                return Err(DownloadError::network(
                    &path,
                    format!("received {} bytes past the end of the range", n as u64 - remaining),
                ));
            }

            file.write_all(&buffer[..n])
                .await
                .map_err(|e| DownloadError::fs("write partial file", &path, e))?;
            file.flush()
                .await
                .map_err(|e| DownloadError::fs("flush partial file", &path, e))?;
            part.read_length += n as u64;
            self.progress.set_position(part.read_length);
        }

        let status = if part.is_completed() {
            self.progress.finish();
            PartStatus::Completed
        } else {
            if !cancelled {
                warn!(
                    part = part.index,
                    read = part.read_length,
                    size = part.size(),
                    "stream ended before the part was complete"
                );
            }
            self.progress.abandon();
            PartStatus::Interrupted
        };
        debug!(part = part.index, read = part.read_length, ?status, "part finished");
        Ok(PartReport::new(part, status))
    }
}

/// Brings `read_length` and the partial file back in line. Bytes written
/// after the last checkpoint are dropped; a file shorter than recorded wins.
async fn reconcile(part: &mut Part, path: &Path) -> Result<()> {
    let on_disk = match fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(DownloadError::fs("stat partial file", path, e)),
    };

    if on_disk > part.read_length {
        warn!(
            part = part.index,
            on_disk,
            recorded = part.read_length,
            "partial file longer than checkpoint, truncating"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| DownloadError::fs("open partial file", path, e))?;
        file.set_len(part.read_length)
            .await
            .map_err(|e| DownloadError::fs("truncate partial file", path, e))?;
    } else if on_disk < part.read_length {
        warn!(
            part = part.index,
            on_disk,
            recorded = part.read_length,
            "partial file shorter than checkpoint, resuming from file length"
        );
        part.read_length = on_disk;
    }
    Ok(())
}

async fn open_partial(path: &Path, truncate: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    if truncate {
        options.write(true).create(true).truncate(true);
    } else {
        options.append(true).create(true);
    }
    options
        .open(path)
        .await
        .map_err(|e| DownloadError::fs("open partial file", path, e))
}
