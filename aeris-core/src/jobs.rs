//! In-memory hierarchical job model: one master job per submission,
//! fanning out into fixed-size URL batches. Progress and status are
//! derived from the batch list on every read; nothing aggregate is
//! stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::BatchOutcome;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Shared cancellation signal for one master job. Checked by the batch
/// manager before starting a batch and by the file pipeline between
/// loader batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: Uuid,
    pub master_id: Uuid,
    pub status: JobStatus,
    pub urls: Vec<String>,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    /// Per-file error strings, each carrying the failing URL.
    pub errors: Vec<String>,
    /// Batch-level failure message, set only when the batch itself
    /// failed (as opposed to individual files within it).
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    fn new(master_id: Uuid, urls: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            master_id,
            status: JobStatus::Pending,
            urls,
            files_succeeded: 0,
            files_failed: 0,
            rows_written: 0,
            errors: Vec::new(),
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MasterJob {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub total_urls: usize,
    pub batch_size: usize,
    pub batches: Vec<BatchJob>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel: CancelFlag,
    seq: u64,
}

/// Derived progress statistics; computed on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub batches_running: usize,
    pub batches_pending: usize,
    pub urls_succeeded: u64,
    pub urls_failed: u64,
    pub completion_pct: f64,
}

impl MasterJob {
    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }

    /// Derived status: `completed` iff every batch completed, `failed`
    /// when every batch is terminal and at least one failed, `running`
    /// while any batch is running or some but not all have finished,
    /// `pending` otherwise.
    pub fn status(&self) -> JobStatus {
        if self.batches.is_empty() {
            return JobStatus::Pending;
        }

        let mut any_running = false;
        let mut any_failed = false;
        let mut terminal = 0;
        for batch in &self.batches {
            match batch.status {
                JobStatus::Running => any_running = true,
                JobStatus::Failed => {
                    any_failed = true;
                    terminal += 1;
                }
                JobStatus::Completed => terminal += 1,
                JobStatus::Pending => {}
            }
        }

        if terminal == self.batches.len() {
            if any_failed {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            }
        } else if any_running || terminal > 0 {
            JobStatus::Running
        } else {
            JobStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn progress(&self) -> Progress {
        let mut progress = Progress {
            batches_completed: 0,
            batches_failed: 0,
            batches_running: 0,
            batches_pending: 0,
            urls_succeeded: 0,
            urls_failed: 0,
            completion_pct: 0.0,
        };

        for batch in &self.batches {
            match batch.status {
                JobStatus::Completed => progress.batches_completed += 1,
                JobStatus::Failed => progress.batches_failed += 1,
                JobStatus::Running => progress.batches_running += 1,
                JobStatus::Pending => progress.batches_pending += 1,
            }
            progress.urls_succeeded += batch.files_succeeded;
            progress.urls_failed += batch.files_failed;
        }

        if !self.batches.is_empty() {
            let finished = progress.batches_completed + progress.batches_failed;
            progress.completion_pct =
                (finished as f64 / self.batches.len() as f64 * 10_000.0).round() / 100.0;
        }

        progress
    }
}

/// Process-wide store of master and batch jobs.
///
/// The mutex lives inside the registry so callers cannot forget to
/// lock, and the synchronous API makes it impossible to hold the lock
/// across an await point. The store is cold on the throughput-critical
/// path; it is hot only at submission and status-poll time.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, MasterJob>,
    next_seq: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a master job with its URL list partitioned into pending
    /// batches of `batch_size`. Returns a snapshot of the stored job.
    pub fn create_master(&self, urls: &[String], batch_size: usize) -> MasterJob {
        let master_id = Uuid::new_v4();
        let batches = urls
            .chunks(batch_size.max(1))
            .map(|chunk| BatchJob::new(master_id, chunk.to_vec()))
            .collect();

        let mut inner = self.guard();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let job = MasterJob {
            id: master_id,
            created_at: Utc::now(),
            total_urls: urls.len(),
            batch_size,
            batches,
            started_at: None,
            completed_at: None,
            cancel: CancelFlag::default(),
            seq,
        };
        inner.jobs.insert(master_id, job.clone());
        job
    }

    pub fn get(&self, id: Uuid) -> Option<MasterJob> {
        self.guard().jobs.get(&id).cloned()
    }

    /// Most-recent-first slice of master jobs.
    pub fn list(&self, limit: usize) -> Vec<MasterJob> {
        let inner = self.guard();
        let mut jobs: Vec<_> = inner.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        jobs.truncate(limit);
        jobs
    }

    /// Number of master jobs that have not reached a terminal state.
    pub fn active_jobs(&self) -> usize {
        self.guard()
            .jobs
            .values()
            .filter(|j| !j.is_terminal())
            .count()
    }

    pub fn mark_master_started(&self, id: Uuid) {
        if let Some(job) = self.guard().jobs.get_mut(&id) {
            job.started_at.get_or_insert_with(Utc::now);
        }
    }

    pub fn mark_master_completed(&self, id: Uuid) {
        if let Some(job) = self.guard().jobs.get_mut(&id) {
            job.completed_at.get_or_insert_with(Utc::now);
        }
    }

    pub fn mark_batch_running(&self, master_id: Uuid, batch_id: Uuid) {
        self.with_batch(master_id, batch_id, |batch| {
            batch.status = JobStatus::Running;
            batch.started_at = Some(Utc::now());
        });
    }

    pub fn complete_batch(&self, master_id: Uuid, batch_id: Uuid, outcome: &BatchOutcome) {
        self.with_batch(master_id, batch_id, |batch| {
            if batch.status.is_terminal() {
                return;
            }
            batch.status = JobStatus::Completed;
            batch.files_succeeded = outcome.files_succeeded;
            batch.files_failed = outcome.files_failed;
            batch.rows_written = outcome.rows_written;
            batch.errors = outcome.errors.clone();
            batch.completed_at = Some(Utc::now());
        });
    }

    pub fn fail_batch(&self, master_id: Uuid, batch_id: Uuid, message: &str) {
        self.with_batch(master_id, batch_id, |batch| {
            if batch.status.is_terminal() {
                return;
            }
            batch.status = JobStatus::Failed;
            batch.error = Some(message.to_string());
            batch.completed_at = Some(Utc::now());
        });
    }

    /// Request cancellation of a running master job. Fails with
    /// `NotFound` for unknown ids and `Conflict` for terminal jobs.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let mut inner = self.guard();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| IngestError::NotFound(format!("job {id} not found")))?;

        if job.is_terminal() {
            return Err(IngestError::Conflict(format!(
                "job {id} already {:?}",
                job.status()
            )));
        }

        job.cancel.cancel();
        Ok(())
    }

    pub fn is_cancelled(&self, id: Uuid) -> bool {
        self.guard()
            .jobs
            .get(&id)
            .map(|j| j.cancel.is_cancelled())
            .unwrap_or(false)
    }

    fn with_batch(&self, master_id: Uuid, batch_id: Uuid, update: impl FnOnce(&mut BatchJob)) {
        let mut inner = self.guard();
        if let Some(job) = inner.jobs.get_mut(&master_id)
            && let Some(batch) = job.batches.iter_mut().find(|b| b.id == batch_id)
        {
            update(batch);
        }
    }

    fn guard(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
