use sqlx::PgPool;

use crate::error::{IngestError, Result};
use crate::parse::SamplingPointRecord;

/// Upserts for the `airquality.sampling_points` dimension.
#[derive(Debug, Clone)]
pub struct SamplingPointsRepository {
    pool: PgPool,
}

impl SamplingPointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert sampling points that are not present yet. Returns the
    /// number of new rows.
    pub async fn upsert_many(&self, records: &[SamplingPointRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(load_err)?;
        let mut inserted = 0;

        for record in records {
            let result = sqlx::query(
                "INSERT INTO airquality.sampling_points \
                     (sampling_point_id, station_code, country_code, pollutant_code) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (sampling_point_id) DO NOTHING",
            )
            .bind(&record.sampling_point_id)
            .bind(&record.station_code)
            .bind(&record.country_code)
            .bind(record.pollutant_code)
            .execute(&mut *tx)
            .await
            .map_err(load_err)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(load_err)?;
        Ok(inserted)
    }
}

fn load_err(e: sqlx::Error) -> IngestError {
    IngestError::Load(e.to_string())
}
