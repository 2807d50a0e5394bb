//! Account endpoints: signup, login and the caller's own record.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use document_store::{DocumentStore, User};
use domain::{LoginRequest, NewAccount};
use serde::Serialize;

use super::DataResponse;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

/// `{"success": true, "token": ...}`
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

impl TokenResponse {
    fn new(token: String) -> Self {
        Self {
            success: true,
            token,
        }
    }
}

/// POST /api/auth/register
#[tracing::instrument(skip_all)]
pub async fn register<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(account) = body?;
    let token = state.auth.register(account).await?;
    Ok((StatusCode::CREATED, Json(TokenResponse::new(token))))
}

/// POST /api/auth/login
#[tracing::instrument(skip_all)]
pub async fn login<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    let token = state.auth.login(request).await?;
    Ok(Json(TokenResponse::new(token)))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<DataResponse<User>> {
    Json(DataResponse::new(user))
}
