//! Shipment endpoints for signed-in users, plus public tracking.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::{DocumentStore, Shipment};
use domain::{PublicTracking, ShipmentDraft, parse_shipment_id};

use super::{DataResponse, ListResponse};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

/// POST /api/shipments: the caller becomes the owner.
#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<ShipmentDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Shipment>>), ApiError> {
    let Json(draft) = body?;
    let shipment = state.shipments.create(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(shipment))))
}

/// GET /api/shipments
#[tracing::instrument(skip_all, fields(user = %user.id))]
pub async fn list_own<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ListResponse<Shipment>>, ApiError> {
    let shipments = state.shipments.list_own(user.id).await?;
    Ok(Json(ListResponse::new(shipments)))
}

/// GET /api/shipments/{id}
#[tracing::instrument(skip_all, fields(user = %user.id, shipment = %id))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Shipment>>, ApiError> {
    let id = parse_shipment_id(&id)?;
    let shipment = state.shipments.get_for(id, &user).await?;
    Ok(Json(DataResponse::new(shipment)))
}

/// GET /api/shipments/track/{trackingId}: no credentials required.
#[tracing::instrument(skip_all, fields(%tracking_id))]
pub async fn track<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<DataResponse<PublicTracking>>, ApiError> {
    let view = state.shipments.track(&tracking_id).await?;
    Ok(Json(DataResponse::new(view)))
}
