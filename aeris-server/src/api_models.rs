use aeris_core::{BatchJob, JobStatus, MasterJob, Progress, Submitted};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub upsert: Option<bool>,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

/// Response to an accepted submission.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAccepted {
    pub master_id: Uuid,
    pub status: JobStatus,
    pub total_urls: usize,
    pub total_batches: usize,
    pub estimated_duration_minutes: f64,
}

impl From<Submitted> for IngestAccepted {
    fn from(submitted: Submitted) -> Self {
        Self {
            master_id: submitted.master_id,
            status: JobStatus::Pending,
            total_urls: submitted.total_urls,
            total_batches: submitted.total_batches,
            estimated_duration_minutes: estimate_minutes(submitted.total_urls),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchJobResponse {
    pub batch_id: Uuid,
    pub status: JobStatus,
    pub urls_count: usize,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}

impl From<&BatchJob> for BatchJobResponse {
    fn from(batch: &BatchJob) -> Self {
        let duration_seconds = match (batch.started_at, batch.completed_at) {
            (Some(started), Some(completed)) => {
                Some((completed - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        };

        Self {
            batch_id: batch.id,
            status: batch.status,
            urls_count: batch.urls.len(),
            files_succeeded: batch.files_succeeded,
            files_failed: batch.files_failed,
            rows_written: batch.rows_written,
            errors: batch.errors.clone(),
            error: batch.error.clone(),
            started_at: batch.started_at,
            completed_at: batch.completed_at,
            duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MasterJobResponse {
    pub master_id: Uuid,
    pub status: JobStatus,
    pub total_urls: usize,
    pub total_batches: usize,
    pub batch_size: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<Vec<BatchJobResponse>>,
}

impl MasterJobResponse {
    pub fn from_job(job: &MasterJob, include_batches: bool) -> Self {
        Self {
            master_id: job.id,
            status: job.status(),
            total_urls: job.total_urls,
            total_batches: job.total_batches(),
            batch_size: job.batch_size,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            progress: job.progress(),
            batches: include_batches
                .then(|| job.batches.iter().map(BatchJobResponse::from).collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<MasterJobResponse>,
    pub total: usize,
}

/// Rough wall-clock estimate from the measured profile: ~150 URLs in
/// ~143 s with the default concurrency caps.
pub fn estimate_minutes(total_urls: usize) -> f64 {
    let minutes = (total_urls as f64 / 150.0) * 2.4;
    (minutes * 10.0).round() / 10.0
}
