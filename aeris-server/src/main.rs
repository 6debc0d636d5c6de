use std::net::SocketAddr;
use std::sync::Arc;

use aeris_server::config::Config;
use aeris_server::{AppState, create_app};

use aeris_core::Database;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments for the Aeris ingestion server
#[derive(Parser, Debug)]
#[command(name = "aeris-server")]
#[command(about = "Batch ingestion server for European air-quality observations")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration from environment
    let mut config = Config::from_env()?;

    // Override config with CLI arguments if provided
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aeris_server=debug,aeris_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.ingest.validate();
    config.ingest.ensure_directories()?;
    info!(
        "scratch directory: {}",
        config.ingest.scratch_dir.display()
    );

    let db = Database::connect(&config.database_url, config.ingest.db_pool_size).await?;

    let settings = Arc::new(config.ingest.clone());
    let state = AppState::new(db, settings)?;
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Aeris server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
