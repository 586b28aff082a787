use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{DownloadError, Result};

pub async fn calculate_hash(filepath: &Path) -> Result<String> {
    let mut file = File::open(filepath)
        .await
        .map_err(|e| DownloadError::fs("open for hashing", filepath, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::fs("read for hashing", filepath, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn url_digest(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}
