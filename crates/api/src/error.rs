//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use regnskap_core::domain::HendelseError;
use regnskap_db::RepositoryError;
use regnskap_scheduler::JobError;
use regnskap_shared::AppError;

/// An `AppError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        Self(err.into())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self(JobError::from(err).into())
    }
}

impl From<HendelseError> for ApiError {
    fn from(err: HendelseError) -> Self {
        Self(match err {
            HendelseError::Malformed(e) => AppError::Malformed(e.to_string()),
            HendelseError::Invalid(msg) => AppError::Validation(msg),
        })
    }
}
