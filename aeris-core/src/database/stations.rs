use sqlx::PgPool;

use crate::error::{IngestError, Result};
use crate::parse::StationRecord;

/// Upserts for the `airquality.stations` dimension, used when
/// bootstrapping reference data from the files themselves.
#[derive(Debug, Clone)]
pub struct StationsRepository {
    pool: PgPool,
}

impl StationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert stations that are not present yet, seeding their country
    /// rows first so the foreign keys hold. Returns the number of new
    /// stations.
    pub async fn upsert_many(&self, records: &[StationRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(load_err)?;
        let mut inserted = 0;

        for record in records {
            sqlx::query(
                "INSERT INTO airquality.countries (country_code) VALUES ($1) \
                 ON CONFLICT (country_code) DO NOTHING",
            )
            .bind(&record.country_code)
            .execute(&mut *tx)
            .await
            .map_err(load_err)?;

            let result = sqlx::query(
                "INSERT INTO airquality.stations (station_code, country_code) VALUES ($1, $2) \
                 ON CONFLICT (station_code) DO NOTHING",
            )
            .bind(&record.station_code)
            .bind(&record.country_code)
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
