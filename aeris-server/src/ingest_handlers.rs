use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use aeris_core::SubmitOptions;

use crate::AppState;
use crate::api_models::{
    IngestAccepted, IngestRequest, JobListResponse, MasterJobResponse,
};
use crate::errors::{AppError, AppResult};

/// POST /ingest - submit a JSON list of Parquet URLs for background
/// ingestion.
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> AppResult<impl IntoResponse> {
    let options = SubmitOptions {
        upsert: request.upsert,
        max_workers: request.max_workers,
    };

    let submitted = state.manager.submit(request.urls, options)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted::from(submitted)),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub upsert: Option<bool>,
}

/// POST /ingest/upload - submit a newline-delimited URL file.
///
/// The file is UTF-8 text, one URL per line; lines starting with `#` are
/// comments and blank lines are skipped.
pub async fn submit_file(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut urls = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("upload read failed: {e}")))?;
        let text = std::str::from_utf8(&data)
            .map_err(|_| AppError::bad_request("file must be UTF-8 encoded text"))?;

        let parsed = parse_url_lines(text);
        info!(
            "URL file uploaded: {} - {} URLs",
            name.as_deref().unwrap_or("<unnamed>"),
            parsed.len()
        );
        urls = Some(parsed);
        break;
    }

    let urls = urls.ok_or_else(|| AppError::bad_request("multipart body carries no file"))?;

    let options = SubmitOptions {
        upsert: params.upsert,
        max_workers: None,
    };

    let submitted = state.manager.submit(urls, options)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted::from(submitted)),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    #[serde(default)]
    pub include_batches: bool,
}

/// GET /ingest/{master_id} - master job with derived progress.
pub async fn status(
    State(state): State<AppState>,
    Path(master_id): Path<Uuid>,
    Query(params): Query<StatusParams>,
) -> AppResult<Json<MasterJobResponse>> {
    let job = state
        .registry
        .get(master_id)
        .ok_or_else(|| AppError::not_found(format!("job {master_id} not found")))?;

    Ok(Json(MasterJobResponse::from_job(
        &job,
        params.include_batches,
    )))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// GET /ingest - most recent master jobs.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<JobListResponse>> {
    let jobs = state.registry.list(params.limit.unwrap_or(50));
    let jobs: Vec<_> = jobs
        .iter()
        .map(|job| MasterJobResponse::from_job(job, false))
        .collect();

    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs,
    }))
}

/// DELETE /ingest/{master_id} - request cancellation of a running job.
pub async fn cancel(
    State(state): State<AppState>,
    Path(master_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.registry.cancel(master_id)?;
    info!("cancellation requested for master job {master_id}");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "master_id": master_id,
            "status": "cancelling",
        })),
    ))
}

/// GET /health - service status with pool statistics.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "active_jobs": state.registry.active_jobs(),
        "pool": state.db.stats(),
    }))
}

fn parse_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
