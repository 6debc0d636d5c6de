//! Batch manager: the entry point from the request layer. Partitions a
//! submission into batches and schedules them under the global
//! concurrency cap.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use crate::batch::BatchRunner;
use crate::database::Database;
use crate::error::{IngestError, Result};
use crate::etl::FileEtl;
use crate::jobs::JobRegistry;
use crate::settings::IngestSettings;

/// Per-submission overrides accepted by the request layer.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Use the conflict-resolving load path for this job.
    pub upsert: Option<bool>,
    /// Override the in-batch file concurrency (K) for this job.
    pub max_workers: Option<usize>,
}

/// Immediate response to a submission; progress is observed through the
/// registry.
#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub master_id: Uuid,
    pub total_urls: usize,
    pub total_batches: usize,
    pub batch_size: usize,
}

/// Schedules batch execution with two nested semaphores: G concurrent
/// batches globally, K concurrent files within each batch. The pipeline
/// peaks at G*K database sessions, which the pool size must cover.
pub struct BatchManager {
    registry: Arc<JobRegistry>,
    etl: Arc<FileEtl>,
    settings: Arc<IngestSettings>,
    batch_permits: Arc<Semaphore>,
}

impl std::fmt::Debug for BatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchManager")
            .field("settings", &self.settings)
            .finish()
    }
}

impl BatchManager {
    pub fn new(
        db: &Database,
        registry: Arc<JobRegistry>,
        settings: Arc<IngestSettings>,
    ) -> Result<Self> {
        let etl = Arc::new(FileEtl::new(db, settings.clone())?);
        let batch_permits = Arc::new(Semaphore::new(settings.max_concurrent_batches));

        Ok(Self {
            registry,
            etl,
            settings,
            batch_permits,
        })
    }

    /// Validate the submission, create the master job, and kick off
    /// background processing. Returns immediately; all blocking happens
    /// inside the semaphore-gated scheduling loop.
    pub fn submit(&self, urls: Vec<String>, options: SubmitOptions) -> Result<Submitted> {
        if urls.is_empty() {
            return Err(IngestError::Validation("URL list is empty".to_string()));
        }
        if urls.len() > self.settings.max_request_urls {
            return Err(IngestError::Validation(format!(
                "URL list has {} entries, more than the configured cap of {}",
                urls.len(),
                self.settings.max_request_urls
            )));
        }

        let upsert = options.upsert.unwrap_or(self.settings.upsert_mode);
        let max_files = options
            .max_workers
            .unwrap_or(self.settings.max_concurrent_files);
        let runner = BatchRunner::new(self.etl.clone(), max_files);

        let job = self.registry.create_master(&urls, self.settings.batch_size);
        info!(
            "master job {} created: {} URLs in {} batches (upsert={upsert})",
            job.id,
            job.total_urls,
            job.total_batches()
        );

        let submitted = Submitted {
            master_id: job.id,
            total_urls: job.total_urls,
            total_batches: job.total_batches(),
            batch_size: job.batch_size,
        };

        let registry = self.registry.clone();
        let permits = self.batch_permits.clone();
        let master_id = job.id;
        let cancel = job.cancel.clone();
        let batches: Vec<(Uuid, Vec<String>)> = job
            .batches
            .iter()
            .map(|b| (b.id, b.urls.clone()))
            .collect();

        tokio::spawn(async move {
            registry.mark_master_started(master_id);

            let mut tasks = JoinSet::new();
            for (batch_id, batch_urls) in batches {
                let permits = permits.clone();
                let registry = registry.clone();
                let runner = runner.clone();
                let cancel = cancel.clone();

                tasks.spawn(async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            registry.fail_batch(master_id, batch_id, "scheduler shut down");
                            return;
                        }
                    };

                    if cancel.is_cancelled() {
                        registry.fail_batch(master_id, batch_id, "cancelled before start");
                        return;
                    }

                    registry.mark_batch_running(master_id, batch_id);
                    info!("batch {batch_id} starting: {} URLs", batch_urls.len());

                    let run = std::panic::AssertUnwindSafe(runner.run(&batch_urls, upsert, &cancel))
                        .catch_unwind()
                        .await;

                    match run {
                        Ok(outcome) => {
                            info!(
                                "batch {batch_id} completed: {} succeeded, {} failed, {} rows",
                                outcome.files_succeeded,
                                outcome.files_failed,
                                outcome.rows_written
                            );
                            registry.complete_batch(master_id, batch_id, &outcome);
                        }
                        Err(_) => {
                            error!("batch {batch_id} panicked");
                            registry.fail_batch(master_id, batch_id, "batch task panicked");
                        }
                    }
                });
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("batch task aborted: {e}");
                }
            }

            registry.mark_master_completed(master_id);
            if let Some(job) = registry.get(master_id) {
                let progress = job.progress();
                info!(
                    "master job {master_id} finished ({:?}): batches {}/{} completed, \
                     URLs {} succeeded / {} failed",
                    job.status(),
                    progress.batches_completed,
                    job.total_batches(),
                    progress.urls_succeeded,
                    progress.urls_failed,
                );
            }
        });

        Ok(submitted)
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }
}
