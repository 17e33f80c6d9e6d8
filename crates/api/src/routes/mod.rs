//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod admin;
pub mod health;
pub mod hendelser;
pub mod metrics;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(hendelser::routes())
        .nest("/admin", admin::routes())
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use regnskap_core::metrics::PrometheusMetrics;
    use regnskap_db::{OppdragRepository, PalopRepository};
    use regnskap_scheduler::KonteringGenerator;
    use sea_orm::DatabaseConnection;
    use std::sync::Arc;

    let db = DatabaseConnection::Disconnected;
    AppState {
        db: Arc::new(db.clone()),
        generator: Arc::new(KonteringGenerator::new(
            OppdragRepository::new(db.clone()),
            PalopRepository::new(db),
        )),
        metrics: Arc::new(PrometheusMetrics::new().unwrap()),
    }
}
