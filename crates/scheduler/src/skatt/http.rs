//! reqwest implementation of [`SkattKlient`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use regnskap_core::krav::{
    BatchUid, Behandlingsstatus, KravKontering, KravRequest, ReskontroSammenligning, SkattError,
    SkattKlient,
};
use regnskap_shared::config::SkattConfig;
use regnskap_shared::context::CORRELATION_ID_HEADER;
use regnskap_shared::CallContext;

use super::retry::Backoff;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendKravSvar {
    batch_uid: String,
}

#[derive(Debug, Deserialize)]
struct VedlikeholdSvar {
    aktiv: bool,
}

/// HTTP client for the Skatt claim API.
#[derive(Debug, Clone)]
pub struct HttpSkattKlient {
    client: Client,
    base_url: String,
    backoff: Backoff,
}

impl HttpSkattKlient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &SkattConfig) -> Result<Self, SkattError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SkattError::InvalidResponse(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            backoff: Backoff::from_config(config),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call<T, F>(&self, ctx: &CallContext, operation: &str, build: F) -> Result<T, SkattError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        self.backoff
            .retry(operation, || Self::once(ctx, operation, build()))
            .await
    }

    async fn once<T: DeserializeOwned>(
        ctx: &CallContext,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, SkattError> {
        let response = request
            .header(CORRELATION_ID_HEADER, ctx.correlation_id())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), correlation_id = %ctx, "Skatt response");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| SkattError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

fn transport_error(err: reqwest::Error) -> SkattError {
    if err.is_decode() || err.is_builder() {
        SkattError::InvalidResponse(err.to_string())
    } else {
        SkattError::Transient(err.to_string())
    }
}

/// Server errors are worth retrying; every other status is final.
fn status_error(status: StatusCode, body: String) -> SkattError {
    if status.is_server_error() {
        SkattError::Transient(format!("{status}: {body}"))
    } else {
        SkattError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[async_trait]
impl SkattKlient for HttpSkattKlient {
    async fn send_krav(
        &self,
        ctx: &CallContext,
        request: &KravRequest,
    ) -> Result<BatchUid, SkattError> {
        let url = self.url("/api/krav");
        let svar: SendKravSvar = self
            .call(ctx, "send_krav", || self.client.post(&url).json(request))
            .await?;
        Ok(BatchUid(svar.batch_uid))
    }

    async fn hent_behandlingsstatus(
        &self,
        ctx: &CallContext,
        batch_uid: &BatchUid,
    ) -> Result<Behandlingsstatus, SkattError> {
        let url = self.url(&format!("/api/krav/behandlingsstatus/{batch_uid}"));
        self.call(ctx, "hent_behandlingsstatus", || self.client.get(&url))
            .await
    }

    async fn sammenlign_med_reskontro(
        &self,
        ctx: &CallContext,
        sak_id: &str,
        konteringer: &[KravKontering],
    ) -> Result<ReskontroSammenligning, SkattError> {
        let url = self.url(&format!("/api/reskontro/{sak_id}/sammenligning"));
        self.call(ctx, "sammenlign_med_reskontro", || {
            self.client.post(&url).json(konteringer)
        })
        .await
    }

    async fn er_vedlikeholdsmodus(&self, ctx: &CallContext) -> Result<bool, SkattError> {
        let url = self.url("/api/vedlikeholdsmodus");
        let svar: VedlikeholdSvar = self
            .call(ctx, "er_vedlikeholdsmodus", || self.client.get(&url))
            .await?;
        Ok(svar.aktiv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Teller {
        kall: AtomicU32,
        med_korrelasjon: AtomicU32,
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn klient(base_url: String) -> HttpSkattKlient {
        let config = SkattConfig {
            base_url,
            timeout_secs: 5,
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        };
        HttpSkattKlient::from_config(&config).unwrap()
    }

    fn request() -> KravRequest {
        KravRequest {
            sak_id: "123456".to_string(),
            krav: Vec::new(),
        }
    }

    #[rstest::rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case(StatusCode::BAD_REQUEST, false)]
    #[case(StatusCode::NOT_FOUND, false)]
    #[case(StatusCode::CONFLICT, false)]
    fn test_status_classification(#[case] status: StatusCode, #[case] transient: bool) {
        assert_eq!(status_error(status, String::new()).is_transient(), transient);
    }

    #[tokio::test]
    async fn test_send_krav_retries_server_errors() {
        let teller = Arc::new(Teller::default());
        let app = Router::new()
            .route(
                "/api/krav",
                post(
                    |State(t): State<Arc<Teller>>, headers: HeaderMap| async move {
                        if headers.contains_key(CORRELATION_ID_HEADER) {
                            t.med_korrelasjon.fetch_add(1, Ordering::SeqCst);
                        }
                        if t.kall.fetch_add(1, Ordering::SeqCst) < 2 {
                            (AxumStatus::SERVICE_UNAVAILABLE, Json(serde_json::json!({})))
                        } else {
                            (AxumStatus::OK, Json(serde_json::json!({ "batchUid": "b-1" })))
                        }
                    },
                ),
            )
            .with_state(teller.clone());

        let klient = klient(serve(app).await);
        let uid = klient
            .send_krav(&CallContext::for_job("send_krav"), &request())
            .await
            .unwrap();

        assert_eq!(uid, BatchUid("b-1".to_string()));
        assert_eq!(teller.kall.load(Ordering::SeqCst), 3);
        assert_eq!(teller.med_korrelasjon.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let teller = Arc::new(Teller::default());
        let app = Router::new()
            .route(
                "/api/krav",
                post(|State(t): State<Arc<Teller>>| async move {
                    t.kall.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::BAD_REQUEST, "ukjent skyldner")
                }),
            )
            .with_state(teller.clone());

        let klient = klient(serve(app).await);
        let err = klient
            .send_krav(&CallContext::new(), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, SkattError::Rejected { status: 400, .. }));
        assert_eq!(teller.kall.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_and_maintenance_flag() {
        let app = Router::new()
            .route(
                "/api/krav/behandlingsstatus/{uid}",
                get(|| async { Json(serde_json::json!({ "status": "Mottatt" })) }),
            )
            .route(
                "/api/vedlikeholdsmodus",
                get(|| async { Json(serde_json::json!({ "aktiv": true })) }),
            );

        let klient = klient(serve(app).await).with_backoff(Backoff::new(
            Duration::from_millis(1),
            Duration::from_millis(1),
            0,
        ));
        let ctx = CallContext::new();

        let status = klient
            .hent_behandlingsstatus(&ctx, &BatchUid("b-1".to_string()))
            .await
            .unwrap();
        assert_eq!(status, Behandlingsstatus::Mottatt);
        assert!(klient.er_vedlikeholdsmodus(&ctx).await.unwrap());
    }
}
