//! Admin-only endpoints: the shipment listing, field mutators, deletion and
//! account management.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use document_store::{DocumentStore, Role, Shipment, User, UserId};
use domain::{ListingPage, ListingRequest, NewAccount, parse_shipment_id};
use serde::{Deserialize, Serialize};

use super::{DataResponse, ListResponse, SuccessResponse};
use crate::AppState;
use crate::error::ApiError;
use crate::extract::AdminUser;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusBody {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentBody {
    pub payment_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AmountBody {
    pub amount: Option<f64>,
}

/// `{"success": true, "count": n, "pagination": {...}, "data": [...]}`
#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: ListingPage,
}

/// Account summary returned by admin creation.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for AccountSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// GET /api/admin/shipments
#[tracing::instrument(skip_all, fields(admin = %admin.id))]
pub async fn list_shipments<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let Query(params) = params?;
    let request = ListingRequest::from_params(params)?;
    let page = state.shipments.list_all(&request).await?;
    Ok(Json(ListingResponse {
        success: true,
        page,
    }))
}

/// PUT /api/admin/shipments/{id}/status
#[tracing::instrument(skip_all, fields(admin = %admin.id, shipment = %id))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<DataResponse<Shipment>>, ApiError> {
    let id = parse_shipment_id(&id)?;
    let Json(body) = body?;
    let shipment = state
        .shipments
        .update_status(id, body.status.as_deref())
        .await?;
    Ok(Json(DataResponse::new(shipment)))
}

/// PUT /api/admin/shipments/{id}/payment
#[tracing::instrument(skip_all, fields(admin = %admin.id, shipment = %id))]
pub async fn update_payment<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> Result<Json<DataResponse<Shipment>>, ApiError> {
    let id = parse_shipment_id(&id)?;
    let Json(body) = body?;
    let shipment = state
        .shipments
        .update_payment(id, body.payment_status.as_deref())
        .await?;
    Ok(Json(DataResponse::new(shipment)))
}

/// PUT /api/admin/shipments/{id}/amount
#[tracing::instrument(skip_all, fields(admin = %admin.id, shipment = %id))]
pub async fn update_amount<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Result<Json<AmountBody>, JsonRejection>,
) -> Result<Json<DataResponse<Shipment>>, ApiError> {
    let id = parse_shipment_id(&id)?;
    let Json(body) = body?;
    let shipment = state.shipments.update_amount(id, body.amount).await?;
    Ok(Json(DataResponse::new(shipment)))
}

/// DELETE /api/admin/shipments/{id}
#[tracing::instrument(skip_all, fields(admin = %admin.id, shipment = %id))]
pub async fn delete_shipment<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = parse_shipment_id(&id)?;
    state.shipments.delete(id).await?;
    Ok(Json(SuccessResponse::default()))
}

/// GET /api/admin/users
#[tracing::instrument(skip_all, fields(admin = %admin.id))]
pub async fn list_users<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<ListResponse<User>>, ApiError> {
    let users = state.auth.list_users().await?;
    Ok(Json(ListResponse::new(users)))
}

/// POST /api/admin/create
#[tracing::instrument(skip_all, fields(admin = %admin.id))]
pub async fn create_admin<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<AccountSummary>>), ApiError> {
    let Json(account) = body?;
    let user = state.auth.create_admin(account).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(AccountSummary::from(user))),
    ))
}
