//! # Aeris Server
//!
//! HTTP surface for the Aeris batch ingestion engine.
//!
//! ## Overview
//!
//! The server accepts URL lists (JSON payloads or uploaded text files),
//! partitions them into batches, and schedules ingestion under the
//! engine's global concurrency cap. Clients poll master-job progress
//! while processing runs in the background.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL/TimescaleDB for the measurement hypertable
//! - The binary COPY protocol for the bulk-load path
//! - An in-process job registry for progress tracking

/// Wire request/response models
pub mod api_models;

/// Server config
pub mod config;

/// Error types and handling
pub mod errors;

/// Ingestion endpoints
pub mod ingest_handlers;

/// Route organization
pub mod routes;

use std::sync::Arc;

use aeris_core::{BatchManager, Database, IngestSettings, JobRegistry};

/// Server application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: Arc<JobRegistry>,
    pub manager: Arc<BatchManager>,
    pub settings: Arc<IngestSettings>,
}

impl AppState {
    pub fn new(db: Database, settings: Arc<IngestSettings>) -> aeris_core::Result<Self> {
        let registry = Arc::new(JobRegistry::new());
        let manager = Arc::new(BatchManager::new(&db, registry.clone(), settings.clone())?);

        Ok(Self {
            db,
            registry,
            manager,
            settings,
        })
    }
}

/// Build the application router for the given state.
pub fn create_app(state: AppState) -> axum::Router {
    routes::router(state)
}
