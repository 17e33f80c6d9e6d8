//! Inbound decision events.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Serialize;

use regnskap_core::domain::VedtakHendelse;
use regnskap_shared::CallContext;
use regnskap_shared::context::CORRELATION_ID_HEADER;

use crate::{AppState, error::ApiError};

/// Creates the event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/hendelser/vedtak", post(motta_vedtak))
}

/// Response for an accepted event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MottattResponse {
    /// Obligation the decision belongs to.
    pub oppdrag_id: String,
    /// Periods created by this delivery.
    pub nye_perioder: usize,
    /// Lines created by this delivery.
    pub nye_konteringer: usize,
}

/// POST `/hendelser/vedtak` - Store a decision event.
///
/// 202 on success and on redelivery, 400 on a malformed payload, 500 when
/// storing fails so the sender redelivers.
async fn motta_vedtak(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<MottattResponse>), ApiError> {
    let ctx = CallContext::from_incoming(
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    let hendelse = VedtakHendelse::parse(&body).inspect_err(|e| {
        tracing::warn!(correlation_id = %ctx, error = %e, "Rejected decision event");
    })?;
    let lagret = state.generator.behandle_hendelse(&ctx, &hendelse).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MottattResponse {
            oppdrag_id: lagret.oppdrag_id.to_string(),
            nye_perioder: lagret.nye_perioder,
            nye_konteringer: lagret.nye_konteringer,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use crate::routes::test_state;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn post_vedtak(body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = create_router(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/hendelser/vedtak")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let (status, body) = post_vedtak("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MALFORMED_PAYLOAD");
    }

    #[tokio::test]
    async fn test_empty_case_is_bad_request() {
        let (status, body) = post_vedtak(
            r#"{"vedtakId":1,"vedtakType":"FASTSETTELSE","stonadType":"BIDRAG","sakId":"",
                "skyldner":"01010112345","kravhaver":"02020212345","gjelder":"03030312345",
                "vedtaksdato":"2023-01-05","opprettetAv":"Z999999","perioder":[]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let (status, _) = post_vedtak(
            r#"{"vedtakId":1,"vedtakType":"FASTSETTELSE","stonadType":"BIDRAG","sakId":"123456",
                "skyldner":"01010112345","kravhaver":"02020212345","gjelder":"03030312345",
                "vedtaksdato":"2023-01-05","opprettetAv":"Z999999",
                "perioder":[{"belop":"1500.00","valuta":"NOK","periodeFra":"2023-01-01"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
