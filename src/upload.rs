//! Reading the PDF "upload" from a local path or an HTTP(S) URL.
//!
//! A shell without a file picker passes a path or URL instead; either way the
//! bytes end up in memory and go through the same staging as a browser
//! upload. Magic-byte validation happens at staging time.

use crate::error::StudioError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default HTTP download timeout, in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read an upload from `input`, downloading it first when it is a URL.
pub async fn read_upload(input: &str, timeout_secs: u64) -> Result<Vec<u8>, StudioError> {
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, StudioError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StudioError::FileNotFound { path })
        }
        Err(e) => Err(StudioError::Internal(format!(
            "Failed to read '{}': {e}",
            path.display()
        ))),
    }
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, StudioError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| StudioError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StudioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let bytes = read_upload(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = read_upload("/definitely/not/a/real/file.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::FileNotFound { .. }));
    }
}
