//! moldtrack-api library - read endpoints over the inspection store

use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route("/api/inspections", get(api::inspections::list_inspections))
        .route("/api/inspections/:id", get(api::inspections::get_inspection))
        .route(
            "/api/inspections/machine/:machine_id/count",
            get(api::inspections::machine_inspection_count),
        )
        .route(
            "/api/analytics/defect-trends",
            get(api::analytics::defect_trends),
        )
        .route(
            "/api/analytics/machine-performance",
            get(api::analytics::machine_performance),
        )
        .route(
            "/api/analytics/defect-distribution",
            get(api::analytics::defect_distribution),
        )
        .route("/api/analytics/summary", get(api::analytics::summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
