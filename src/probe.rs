use reqwest::{header, Client};
use tracing::debug;

use crate::error::{DownloadError, Result};
use crate::utils::resolve_filename;

/// What a single HEAD request tells us about the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub total_size: u64,
    pub accepts_ranges: bool,
    pub filename: String,
}

pub async fn probe(client: &Client, url: &str) -> Result<ResourceInfo> {
    let metadata_error = |reason: String| DownloadError::Metadata {
        url: url.to_string(),
        reason,
    };

    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| metadata_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(metadata_error(format!("server answered {}", response.status())));
    }

    let headers = response.headers();
    let total_size = headers
        .get(header::CONTENT_LENGTH)
        .ok_or_else(|| metadata_error("missing Content-Length header".to_string()))?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| metadata_error("unparseable Content-Length header".to_string()))?;

    let accepts_ranges = headers
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "bytes")
        .unwrap_or(false);

    let content_disposition = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok());

    let info = ResourceInfo {
        total_size,
        accepts_ranges,
        filename: resolve_filename(content_disposition, response.url().as_str()),
    };
    debug!(?info, "probed resource");
    Ok(info)
}
