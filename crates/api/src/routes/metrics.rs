//! Prometheus scrape endpoint.

use axum::{Router, extract::State, http::header, response::IntoResponse, routing::get};

use regnskap_shared::AppError;

use crate::{ApiError, AppState};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}

/// Creates the scrape route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}
