//! Batch runner: executes one fixed-size group of file URLs with
//! bounded file-level concurrency.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::IngestError;
use crate::etl::FileEtl;
use crate::jobs::CancelFlag;

/// Aggregated counters for one executed batch. Per-file failures are
/// counted and listed here; they never abort the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    /// Per-URL error strings, each carrying the failing URL.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    etl: Arc<FileEtl>,
    max_concurrent_files: usize,
}

impl BatchRunner {
    pub fn new(etl: Arc<FileEtl>, max_concurrent_files: usize) -> Self {
        Self {
            etl,
            max_concurrent_files: max_concurrent_files.max(1),
        }
    }

    /// Run the file pipeline for every URL, at most
    /// `max_concurrent_files` in flight at once. Each file returns
    /// independently; a failing file does not cancel its siblings.
    pub async fn run(&self, urls: &[String], upsert: bool, cancel: &CancelFlag) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_files));
        let mut tasks = JoinSet::new();

        for url in urls {
            let url = url.clone();
            let etl = self.etl.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            url.clone(),
                            Err(IngestError::Internal(format!(
                                "{url}: file semaphore closed"
                            ))),
                        );
                    }
                };

                if cancel.is_cancelled() {
                    return (
                        url.clone(),
                        Err(IngestError::Cancelled(format!("{url}: not started"))),
                    );
                }

                let result = etl.run(&url, upsert, &cancel).await;
                (url, result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => {
                    outcome.files_succeeded += 1;
                    outcome.rows_written += report.rows_written;
                }
                Ok((url, Err(e))) => {
                    warn!("file pipeline failed for {url}: {e}");
                    outcome.files_failed += 1;
                    outcome.errors.push(e.to_string());
                }
                Err(join_error) => {
                    warn!("file task aborted: {join_error}");
                    outcome.files_failed += 1;
                    outcome.errors.push(format!("file task aborted: {join_error}"));
                }
            }
        }

        outcome
    }
}
