use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{IngestError, Result};
use crate::settings::IngestSettings;

/// A downloaded artifact on local disk.
#[derive(Debug)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Streams remote Parquet files to the scratch directory.
///
/// One shared client keeps connections warm across downloads. The fetcher
/// never retries; retry policy belongs to the callers that own the batch.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(settings: &IngestSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Internal(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            client,
            scratch_dir: settings.scratch_dir.clone(),
            timeout: settings.fetch_timeout,
        })
    }

    /// Download `url` into the scratch directory, streaming the body in
    /// chunks so large files never sit in memory whole.
    ///
    /// On any error after the destination file was created, the partial
    /// artifact is removed before the error is surfaced.
    pub async fn fetch_to_file(&self, url: &str) -> Result<FetchedFile> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| IngestError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.is_empty()
            && !content_type.contains("parquet")
            && !content_type.contains("octet-stream")
        {
            debug!("unexpected content type for {url}: {content_type}");
        }

        let path = self.scratch_dir.join(derive_filename(url));
        let mut file = File::create(&path)
            .await
            .map_err(|e| IngestError::Fetch(format!("scratch file create failed: {e}")))?;
        let mut stream = response.bytes_stream();
        let mut bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    remove_partial(&path).await;
                    return Err(IngestError::Fetch(format!("body read failed: {e}")));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                remove_partial(&path).await;
                return Err(IngestError::Fetch(format!("write failed: {e}")));
            }
            bytes += chunk.len() as u64;
        }

        if let Err(e) = file.flush().await {
            remove_partial(&path).await;
            return Err(IngestError::Fetch(format!("flush failed: {e}")));
        }

        info!(
            "downloaded {url} ({:.2} MiB) to {}",
            bytes as f64 / (1024.0 * 1024.0),
            path.display()
        );

        Ok(FetchedFile { path, bytes })
    }
}

/// Last path segment of the URL, with ".parquet" appended when absent.
fn derive_filename(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "download".to_string());

    if segment.ends_with(".parquet") {
        segment
    } else {
        format!("{segment}.parquet")
    }
}

async fn remove_partial(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
