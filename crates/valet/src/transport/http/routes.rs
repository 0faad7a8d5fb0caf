//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, InsertOutcome, SortKey};
use crate::health::Health;
use crate::record::{RecordId, Reservation};
use crate::service::{HealthSnapshot, LotService};
use crate::version::VersionInfo;
use crate::view::Counts;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: Health,
    pub capacity: usize,
    pub counts: Counts,
    pub version: VersionInfo,
}

impl From<HealthSnapshot> for HealthCheckResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            status: snapshot.state,
            capacity: snapshot.capacity,
            counts: snapshot.counts,
            version: snapshot.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub plate: String,
    /// `"auto"`, a slot number, or absent for auto.
    #[serde(default)]
    pub slot: Option<SlotField>,
}

/// Slot choice as sent by clients: `"auto"`, `"3"`, or `3`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SlotField {
    Number(i64),
    Text(String),
}

impl SlotField {
    fn into_raw(self) -> String {
        match self {
            SlotField::Number(n) => n.to_string(),
            SlotField::Text(s) => s,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub removed: Option<Reservation>,
    pub promoted: Option<Reservation>,
    pub counts: Counts,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub by: SortKey,
}

fn error_body(
    status: StatusCode,
    message: String,
    kind: &str,
) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "kind": kind,
        })),
    )
}

fn error_response(err: &EngineError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        EngineError::Validation(_) | EngineError::InvalidSlot { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::Duplicate(_) | EngineError::SlotOccupied(_) => StatusCode::CONFLICT,
    };
    error_body(status, err.to_string(), err.kind())
}

/// A body that is not the expected JSON shape is a validation failure like any other.
fn rejection_response(rejection: JsonRejection) -> (StatusCode, Json<serde_json::Value>) {
    tracing::debug!(error = %rejection.body_text(), "Request body rejected");
    error_body(
        StatusCode::UNPROCESSABLE_ENTITY,
        rejection.body_text(),
        "validation",
    )
}

async fn health_check(State(service): State<Arc<LotService>>) -> Json<HealthCheckResponse> {
    Json(service.health().await.into())
}

async fn lot_view(State(service): State<Arc<LotService>>) -> impl IntoResponse {
    Json(service.view().await)
}

async fn list_reservations(
    State(service): State<Arc<LotService>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Reservation>> {
    match params.q {
        Some(term) => Json(service.request_search(&term).await),
        None => Json(service.reservations().await),
    }
}

async fn create_reservation(
    State(service): State<Arc<LotService>>,
    body: Result<Json<ReservationRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response(rejection).into_response(),
    };
    let slot = request
        .slot
        .map(SlotField::into_raw)
        .unwrap_or_else(|| "auto".to_string());

    match service.request_insert(&request.plate, &slot).await {
        Ok(receipt) => {
            let status = match receipt.outcome {
                InsertOutcome::Reserved { .. } => StatusCode::CREATED,
                InsertOutcome::Queued { .. } => StatusCode::ACCEPTED,
            };
            (status, Json(receipt)).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, plate = %request.plate, "Insert rejected");
            error_response(&e).into_response()
        }
    }
}

async fn delete_reservation(
    State(service): State<Arc<LotService>>,
    Path(id): Path<String>,
) -> Json<DeleteResponse> {
    // An id that cannot be parsed cannot name a live reservation, so it is
    // handled like any other unknown id.
    let Ok(id) = RecordId::parse(&id) else {
        tracing::debug!(%id, "Delete with unparsable id ignored");
        return Json(DeleteResponse {
            removed: None,
            promoted: None,
            counts: service.counts().await,
        });
    };

    let receipt = service.request_delete(id).await;
    Json(DeleteResponse {
        removed: receipt.outcome.removed().cloned(),
        promoted: receipt.outcome.promoted().cloned(),
        counts: receipt.counts,
    })
}

async fn sort_reservations(
    State(service): State<Arc<LotService>>,
    body: Result<Json<SortRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(request)) => Json(service.request_sort(request.by).await).into_response(),
        Err(rejection) => rejection_response(rejection).into_response(),
    }
}

async fn reverse_reservations(State(service): State<Arc<LotService>>) -> impl IntoResponse {
    Json(service.request_reverse().await)
}

async fn reset(State(service): State<Arc<LotService>>) -> impl IntoResponse {
    tracing::info!("Reset requested via HTTP");
    Json(service.request_reset().await)
}

async fn shutdown(State(service): State<Arc<LotService>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via HTTP");
    service.trigger_shutdown();
    (StatusCode::OK, Json(serde_json::json!({})))
}

pub fn routes(service: Arc<LotService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/lot", get(lot_view))
        .route(
            "/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route("/reservations/{id}", delete(delete_reservation))
        .route("/reservations/sort", post(sort_reservations))
        .route("/reservations/reverse", post(reverse_reservations))
        .route("/reset", post(reset))
        .route("/shutdown", post(shutdown))
        .with_state(service)
}
