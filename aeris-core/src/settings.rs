use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Tuning knobs for the ingestion engine, loaded from environment
/// variables with defaults chosen from the source system's own
/// measurements (~150 URLs in ~143 s with three concurrent batches of
/// three concurrent files each).
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Max simultaneous database sessions.
    pub db_pool_size: u32,
    /// Directory for fetched scratch artifacts.
    pub scratch_dir: PathBuf,
    /// URLs per batch.
    pub batch_size: usize,
    /// Global concurrent batches (G).
    pub max_concurrent_batches: usize,
    /// In-batch file concurrency (K).
    pub max_concurrent_files: usize,
    /// Rows per COPY batch.
    pub loader_batch_size: usize,
    /// Per-URL download timeout.
    pub fetch_timeout: Duration,
    /// Use the slower conflict-resolving load path by default.
    pub upsert_mode: bool,
    /// Upsert the parser's station / sampling-point projections before
    /// loading measurements, so an empty database can be bootstrapped
    /// from the files themselves.
    pub bootstrap_reference: bool,
    /// Reject submissions with more URLs than this.
    pub max_request_urls: usize,
    /// User-agent sent with every download request.
    pub user_agent: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            db_pool_size: 15,
            scratch_dir: PathBuf::from("data/raw"),
            batch_size: 50,
            max_concurrent_batches: 3,
            max_concurrent_files: 3,
            loader_batch_size: 50_000,
            fetch_timeout: Duration::from_secs(300),
            upsert_mode: false,
            bootstrap_reference: false,
            max_request_urls: 10_000,
            user_agent: format!("aeris/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl IngestSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            db_pool_size: parse_var("DB_POOL_SIZE", defaults.db_pool_size),
            scratch_dir: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            batch_size: parse_var("BATCH_SIZE", defaults.batch_size).max(1),
            max_concurrent_batches: parse_var(
                "MAX_CONCURRENT_BATCHES",
                defaults.max_concurrent_batches,
            )
            .max(1),
            max_concurrent_files: parse_var(
                "MAX_CONCURRENT_FILES_PER_BATCH",
                defaults.max_concurrent_files,
            )
            .max(1),
            loader_batch_size: parse_var("LOADER_BATCH_SIZE", defaults.loader_batch_size).max(1),
            fetch_timeout: Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_SECONDS",
                defaults.fetch_timeout.as_secs(),
            )),
            upsert_mode: parse_var("UPSERT_MODE", defaults.upsert_mode),
            bootstrap_reference: parse_var("BOOTSTRAP_REFERENCE", defaults.bootstrap_reference),
            max_request_urls: parse_var("MAX_REQUEST_URLS", defaults.max_request_urls).max(1),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Database-connection pressure is the binding constraint: G batches
    /// of K files each peak at G*K concurrent copy sessions. Warn when a
    /// configuration leaves no headroom in the pool.
    pub fn validate(&self) {
        let peak = self.max_concurrent_batches * self.max_concurrent_files;
        if peak >= self.db_pool_size as usize {
            warn!(
                "max_concurrent_batches * max_concurrent_files_per_batch = {} \
                 saturates the database pool (size {}); expect acquire timeouts",
                peak, self.db_pool_size
            );
        }
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.scratch_dir)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
