//! File-scope ETL: drives fetch -> parse -> load for one URL and owns
//! the cleanup of its scratch artifact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::database::{
    Database, MeasurementsRepository, SamplingPointsRepository, StationsRepository,
};
use crate::error::{IngestError, Result};
use crate::fetch::Fetcher;
use crate::jobs::CancelFlag;
use crate::observation::Observation;
use crate::parse::{ObservationReader, ReferenceProjection};
use crate::settings::IngestSettings;

/// Counters for one successfully processed file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub url: String,
    pub rows_written: u64,
    pub bytes_fetched: u64,
    pub skipped_rows: u64,
    pub elapsed_download: Duration,
    pub elapsed_parse: Duration,
    pub elapsed_load: Duration,
}

/// Removes the scratch artifact when the pipeline leaves scope, on
/// success and on every error path alike.
#[derive(Debug)]
struct ScratchGuard {
    path: PathBuf,
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Clone)]
pub struct FileEtl {
    fetcher: Fetcher,
    measurements: MeasurementsRepository,
    stations: StationsRepository,
    sampling_points: SamplingPointsRepository,
    settings: Arc<IngestSettings>,
}

impl FileEtl {
    pub fn new(db: &Database, settings: Arc<IngestSettings>) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(&settings)?,
            measurements: MeasurementsRepository::new(db.pool().clone()),
            stations: StationsRepository::new(db.pool().clone()),
            sampling_points: SamplingPointsRepository::new(db.pool().clone()),
            settings,
        })
    }

    /// Download one file, stream its rows into the bulk loader in
    /// configured batch sizes, and return the counters. The scratch file
    /// is deleted on every exit path; errors come back with the URL
    /// attached.
    pub async fn run(&self, url: &str, upsert: bool, cancel: &CancelFlag) -> Result<FileReport> {
        let download_started = Instant::now();
        let fetched = self
            .fetcher
            .fetch_to_file(url)
            .await
            .map_err(|e| with_url(url, e))?;
        let elapsed_download = download_started.elapsed();

        let _scratch = ScratchGuard {
            path: fetched.path.clone(),
        };

        let result = self.parse_and_load(&fetched.path, upsert, cancel).await;
        let (rows_written, skipped_rows, elapsed_parse, elapsed_load) =
            result.map_err(|e| with_url(url, e))?;

        let total = elapsed_download + elapsed_parse + elapsed_load;
        let throughput = rows_written as f64 / total.as_secs_f64().max(f64::EPSILON);
        info!(
            "ETL complete for {url}: {rows_written} rows ({skipped_rows} skipped) in {:.2}s \
             (download {:.2}s, parse {:.2}s, load {:.2}s) | {throughput:.0} rows/sec",
            total.as_secs_f64(),
            elapsed_download.as_secs_f64(),
            elapsed_parse.as_secs_f64(),
            elapsed_load.as_secs_f64(),
        );

        Ok(FileReport {
            url: url.to_string(),
            rows_written,
            bytes_fetched: fetched.bytes,
            skipped_rows,
            elapsed_download,
            elapsed_parse,
            elapsed_load,
        })
    }

    async fn parse_and_load(
        &self,
        path: &std::path::Path,
        upsert: bool,
        cancel: &CancelFlag,
    ) -> Result<(u64, u64, Duration, Duration)> {
        let mut reader = ObservationReader::open(path)?;
        let batch_cap = self.settings.loader_batch_size;

        let mut chunk: Vec<Observation> = Vec::with_capacity(batch_cap.min(BATCH_PREALLOC));
        let mut rows_written: u64 = 0;
        let mut elapsed_parse = Duration::ZERO;
        let mut elapsed_load = Duration::ZERO;

        loop {
            let parse_started = Instant::now();
            let mut input_exhausted = false;
            while chunk.len() < batch_cap {
                match reader.next() {
                    Some(Ok(row)) => chunk.push(row),
                    Some(Err(e)) => return Err(e),
                    None => {
                        input_exhausted = true;
                        break;
                    }
                }
            }
            elapsed_parse += parse_started.elapsed();

            if !chunk.is_empty() {
                let load_started = Instant::now();
                if self.settings.bootstrap_reference {
                    self.bootstrap_reference(&chunk).await?;
                }
                let written = if upsert {
                    self.measurements.bulk_upsert(&chunk).await?
                } else {
                    self.measurements.bulk_copy(&chunk).await?
                };
                elapsed_load += load_started.elapsed();
                rows_written += written;
                chunk.clear();
            }

            // Safe suspension point: the current loader batch has
            // committed or aborted.
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled(format!(
                    "aborted after {rows_written} rows"
                )));
            }

            if input_exhausted {
                break;
            }
        }

        let skipped = reader.skipped_rows();
        if rows_written == 0 && skipped == 0 {
            return Err(IngestError::Parse("file contains no rows".to_string()));
        }

        Ok((rows_written, skipped, elapsed_parse, elapsed_load))
    }

    /// Upsert the chunk's distinct stations and sampling points ahead of
    /// the measurements so the foreign keys hold on an empty database.
    async fn bootstrap_reference(&self, chunk: &[Observation]) -> Result<()> {
        let mut projection = ReferenceProjection::default();
        for row in chunk {
            projection.observe(&row.sampling_point_id, row.pollutant_code);
        }
        if projection.is_empty() {
            return Ok(());
        }

        self.stations.upsert_many(&projection.stations()).await?;
        self.sampling_points
            .upsert_many(&projection.sampling_points())
            .await?;
        Ok(())
    }
}

const BATCH_PREALLOC: usize = 16 * 1024;

fn with_url(url: &str, e: IngestError) -> IngestError {
    match e {
        IngestError::Fetch(m) => IngestError::Fetch(format!("{url}: {m}")),
        IngestError::Parse(m) => IngestError::Parse(format!("{url}: {m}")),
        IngestError::Load(m) => IngestError::Load(format!("{url}: {m}")),
        IngestError::Cancelled(m) => IngestError::Cancelled(format!("{url}: {m}")),
        other => other,
    }
}
