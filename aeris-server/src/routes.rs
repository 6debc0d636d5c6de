use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;
use crate::ingest_handlers;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/ingest",
            post(ingest_handlers::submit).get(ingest_handlers::list),
        )
        .route("/ingest/upload", post(ingest_handlers::submit_file))
        .route(
            "/ingest/{master_id}",
            get(ingest_handlers::status).delete(ingest_handlers::cancel),
        )
        .route("/health", get(ingest_handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
