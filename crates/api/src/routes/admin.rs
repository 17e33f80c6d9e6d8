//! Administrative routes: accrual runs, outages and deferrals.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use regnskap_core::domain::Overforingsperiode;
use regnskap_db::entities::{driftsavvik, palop};
use regnskap_db::repositories::{NyttDriftsavvik, PalopStatus};
use regnskap_db::{DriftsavvikRepository, OppdragRepository, PalopRepository};
use regnskap_shared::types::OppdragId;

use crate::{AppState, error::ApiError};

/// Creates the admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/palop", post(opprett_palop).get(list_palop))
        .route("/driftsavvik", post(opprett_driftsavvik))
        .route("/driftsavvik/aktive", get(aktive_driftsavvik))
        .route("/driftsavvik/{id}/avslutt", post(avslutt_driftsavvik))
        .route("/oppdrag/{id}/utsett", post(utsett_oppdrag))
}

/// Request body for scheduling an accrual run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpprettPalopRequest {
    /// When the run becomes due.
    pub kjoredato: DateTime<Utc>,
    /// Month the run closes.
    pub for_periode: Overforingsperiode,
}

/// An accrual run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PalopResponse {
    /// Run id.
    pub id: Uuid,
    /// When the run becomes due.
    pub kjoredato: DateTime<Utc>,
    /// Month the run closes.
    pub for_periode: String,
    /// Lifecycle state.
    pub status: PalopStatus,
    /// Start time.
    pub startet_tidspunkt: Option<DateTime<Utc>>,
    /// Finish time.
    pub fullfort_tidspunkt: Option<DateTime<Utc>>,
}

impl From<palop::Model> for PalopResponse {
    fn from(model: palop::Model) -> Self {
        Self {
            status: PalopStatus::fra_modell(&model),
            id: model.id,
            kjoredato: model.kjoredato.with_timezone(&Utc),
            for_periode: model.for_periode,
            startet_tidspunkt: model.startet_tidspunkt.map(|t| t.with_timezone(&Utc)),
            fullfort_tidspunkt: model.fullfort_tidspunkt.map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Request body for declaring an outage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpprettDriftsavvikRequest {
    /// Start, defaults to now.
    pub tidspunkt_fra: Option<DateTime<Utc>>,
    /// Planned end, open-ended when absent.
    pub tidspunkt_til: Option<DateTime<Utc>>,
    /// Reason.
    pub arsak: String,
    /// Who declares it.
    pub opprettet_av: String,
}

/// An outage declaration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftsavvikResponse {
    /// Outage id.
    pub id: Uuid,
    /// Start.
    pub tidspunkt_fra: DateTime<Utc>,
    /// End.
    pub tidspunkt_til: Option<DateTime<Utc>>,
    /// Accrual run that declared it.
    pub palop_id: Option<Uuid>,
    /// Reason.
    pub arsak: String,
    /// Who declared it.
    pub opprettet_av: String,
}

impl From<driftsavvik::Model> for DriftsavvikResponse {
    fn from(model: driftsavvik::Model) -> Self {
        Self {
            id: model.id,
            tidspunkt_fra: model.tidspunkt_fra.with_timezone(&Utc),
            tidspunkt_til: model.tidspunkt_til.map(|t| t.with_timezone(&Utc)),
            palop_id: model.palop_id,
            arsak: model.arsak,
            opprettet_av: model.opprettet_av,
        }
    }
}

/// Request body for deferring an obligation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsettRequest {
    /// Lines are held back until this date; `null` lifts the deferral.
    pub utsatt_til_dato: Option<NaiveDate>,
}

/// POST `/admin/palop` - Schedule an accrual run.
async fn opprett_palop(
    State(state): State<AppState>,
    Json(request): Json<OpprettPalopRequest>,
) -> Result<(StatusCode, Json<PalopResponse>), ApiError> {
    let repo = PalopRepository::new((*state.db).clone());
    let model = repo.opprett(request.kjoredato, request.for_periode).await?;
    info!(palop_id = %model.id, periode = %model.for_periode, "Accrual run scheduled");
    Ok((StatusCode::CREATED, Json(model.into())))
}

/// GET `/admin/palop` - List accrual runs with status.
async fn list_palop(State(state): State<AppState>) -> Result<Json<Vec<PalopResponse>>, ApiError> {
    let repo = PalopRepository::new((*state.db).clone());
    let runs = repo.list().await?;
    Ok(Json(runs.into_iter().map(Into::into).collect()))
}

/// POST `/admin/driftsavvik` - Declare an outage.
async fn opprett_driftsavvik(
    State(state): State<AppState>,
    Json(request): Json<OpprettDriftsavvikRequest>,
) -> Result<(StatusCode, Json<DriftsavvikResponse>), ApiError> {
    let repo = DriftsavvikRepository::new((*state.db).clone());
    let model = repo
        .opprett(NyttDriftsavvik {
            tidspunkt_fra: request.tidspunkt_fra.unwrap_or_else(Utc::now),
            tidspunkt_til: request.tidspunkt_til,
            palop_id: None,
            arsak: request.arsak,
            opprettet_av: request.opprettet_av,
        })
        .await?;
    info!(driftsavvik_id = %model.id, arsak = %model.arsak, "Outage declared");
    Ok((StatusCode::CREATED, Json(model.into())))
}

/// POST `/admin/driftsavvik/{id}/avslutt` - Close an outage now.
async fn avslutt_driftsavvik(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriftsavvikResponse>, ApiError> {
    let repo = DriftsavvikRepository::new((*state.db).clone());
    let model = repo.avslutt(id, Utc::now()).await?;
    info!(driftsavvik_id = %model.id, "Outage closed");
    Ok(Json(model.into()))
}

/// GET `/admin/driftsavvik/aktive` - Outages in effect now.
async fn aktive_driftsavvik(
    State(state): State<AppState>,
) -> Result<Json<Vec<DriftsavvikResponse>>, ApiError> {
    let repo = DriftsavvikRepository::new((*state.db).clone());
    let aktive = repo.aktive(Utc::now()).await?;
    Ok(Json(aktive.into_iter().map(Into::into).collect()))
}

/// POST `/admin/oppdrag/{id}/utsett` - Set or lift an obligation's deferral.
async fn utsett_oppdrag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UtsettRequest>,
) -> Result<StatusCode, ApiError> {
    let repo = OppdragRepository::new((*state.db).clone());
    repo.sett_utsatt_til(OppdragId::from_uuid(id), request.utsatt_til_dato)
        .await?;
    info!(oppdrag_id = %id, utsatt_til_dato = ?request.utsatt_til_dato, "Deferral updated");
    Ok(StatusCode::NO_CONTENT)
}
