use std::fmt;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{IngestError, Result};

/// Statistics about the connection pool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
}

/// Shared handle to the ingestion database.
///
/// The bulk loaders are the only consumers on the hot path; the pool
/// size bounds how many copy sessions can run at once.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    max_connections: u32,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl Database {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = Self::pool_options(max_connections, Duration::from_secs(30))
            .connect(connection_string)
            .await
            .map_err(|e| IngestError::Internal(format!("database connection failed: {e}")))?;

        info!("database pool initialized with max_connections={max_connections}");

        Ok(Self {
            pool,
            max_connections,
        })
    }

    /// Build the pool without dialing the server; connections are
    /// established on first acquire, waiting at most `acquire_timeout`.
    /// Used where startup must not depend on database availability.
    pub fn connect_lazy(
        connection_string: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = Self::pool_options(max_connections, acquire_timeout)
            .connect_lazy(connection_string)
            .map_err(|e| IngestError::Internal(format!("invalid database URL: {e}")))?;

        Ok(Self {
            pool,
            max_connections,
        })
    }

    fn pool_options(max_connections: u32, acquire_timeout: Duration) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .max_lifetime(Duration::from_secs(1800))
            .idle_timeout(Duration::from_secs(600))
            // Unqualified names resolve to the application schema first.
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET search_path = airquality, public")
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.max_connections,
        }
    }
}
