use sqlx::PgPool;
use tracing::debug;

use crate::database::copy::{CopyBuffer, MEASUREMENT_COLUMNS};
use crate::error::{IngestError, Result};
use crate::observation::Observation;

/// Bulk writer for the `airquality.measurements` hypertable.
///
/// The fast path is a straight binary COPY with no conflict resolution:
/// duplicate primary keys abort the transaction and surface as a load
/// error. The upsert path stages the same frames into a transient clone
/// and merges, trading 3-5x throughput for rerun safety.
#[derive(Debug, Clone)]
pub struct MeasurementsRepository {
    pool: PgPool,
}

impl MeasurementsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write one batch of rows inside a single transaction using the
    /// binary copy protocol. Any error rolls the transaction back and
    /// surfaces with the database's diagnostic attached.
    pub async fn bulk_copy(&self, rows: &[Observation]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(load_err)?;

        let statement = format!(
            "COPY airquality.measurements ({MEASUREMENT_COLUMNS}) FROM STDIN WITH (FORMAT binary)"
        );
        let mut copy = tx.copy_in_raw(&statement).await.map_err(load_err)?;
        copy.send(encode(rows)).await.map_err(load_err)?;
        let written = copy.finish().await.map_err(load_err)?;

        tx.commit().await.map_err(load_err)?;

        debug!("COPY wrote {written} measurements");
        Ok(written)
    }

    /// Conflict-resolving path for rerun/repair workflows: binary COPY
    /// into a transaction-scoped staging clone, then a merge into the
    /// hypertable with `ON CONFLICT (time, sampling_point_id) DO UPDATE`.
    pub async fn bulk_upsert(&self, rows: &[Observation]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(load_err)?;

        sqlx::query(
            "CREATE TEMP TABLE measurements_stage \
             (LIKE airquality.measurements INCLUDING DEFAULTS) ON COMMIT DROP",
        )
        .execute(&mut *tx)
        .await
        .map_err(load_err)?;

        let statement =
            format!("COPY measurements_stage ({MEASUREMENT_COLUMNS}) FROM STDIN WITH (FORMAT binary)");
        let mut copy = tx.copy_in_raw(&statement).await.map_err(load_err)?;
        copy.send(encode(rows)).await.map_err(load_err)?;
        copy.finish().await.map_err(load_err)?;

        // The stage may carry duplicate keys from the input itself;
        // DISTINCT ON keeps one candidate per key so the merge never
        // touches a target row twice.
        let merged = sqlx::query(&format!(
            "INSERT INTO airquality.measurements ({MEASUREMENT_COLUMNS}) \
             SELECT DISTINCT ON (time, sampling_point_id) {MEASUREMENT_COLUMNS} \
             FROM measurements_stage \
             ORDER BY time, sampling_point_id \
             ON CONFLICT (time, sampling_point_id) DO UPDATE SET \
                 pollutant_code = EXCLUDED.pollutant_code, \
                 value = EXCLUDED.value, \
                 unit = EXCLUDED.unit, \
                 aggregation_type = EXCLUDED.aggregation_type, \
                 validity = EXCLUDED.validity, \
                 verification = EXCLUDED.verification, \
                 data_capture = EXCLUDED.data_capture, \
                 result_time = EXCLUDED.result_time, \
                 observation_id = EXCLUDED.observation_id"
        ))
        .execute(&mut *tx)
        .await
        .map_err(load_err)?
        .rows_affected();

        tx.commit().await.map_err(load_err)?;

        debug!("upsert merged {merged} measurements");
        Ok(merged)
    }
}

fn encode(rows: &[Observation]) -> Vec<u8> {
    let mut buf = CopyBuffer::with_capacity_rows(rows.len());
    for row in rows {
        buf.push(row);
    }
    buf.finish()
}

fn load_err(e: sqlx::Error) -> IngestError {
    IngestError::Load(e.to_string())
}
