//! # Aeris Core
//!
//! Batch ingestion engine for European air-quality observations.
//!
//! The engine takes lists of remote Parquet file URLs, downloads them with
//! bounded parallelism, projects their columns onto the normalized
//! measurement schema, and bulk-loads the rows into a
//! PostgreSQL/TimescaleDB hypertable over the binary COPY protocol.
//! Hierarchical jobs (one master job fanning out into fixed-size URL
//! batches) are tracked in an in-process registry that callers poll for
//! progress.

pub mod batch;
pub mod database;
pub mod error;
pub mod etl;
pub mod fetch;
pub mod jobs;
pub mod manager;
pub mod observation;
pub mod parse;
pub mod settings;

pub use batch::{BatchOutcome, BatchRunner};
pub use database::{
    Database, MeasurementsRepository, PoolStats, SamplingPointsRepository, StationsRepository,
};
pub use error::{IngestError, Result};
pub use etl::{FileEtl, FileReport};
pub use fetch::{FetchedFile, Fetcher};
pub use jobs::{BatchJob, CancelFlag, JobRegistry, JobStatus, MasterJob, Progress};
pub use manager::{BatchManager, SubmitOptions, Submitted};
pub use observation::Observation;
pub use parse::{ObservationReader, ReferenceProjection};
pub use settings::IngestSettings;
