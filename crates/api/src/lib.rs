//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - The inbound decision event endpoint
//! - The administrative surface for accrual runs, outages and deferrals
//! - The Prometheus scrape endpoint
//! - Error responses mapped from `AppError`

pub mod error;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use regnskap_core::metrics::PrometheusMetrics;
use regnskap_scheduler::KonteringGenerator;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Line generator used by the event endpoint.
    pub generator: Arc<KonteringGenerator>,
    /// Job metrics, also handed to the scheduler.
    pub metrics: Arc<PrometheusMetrics>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .merge(routes::metrics::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
