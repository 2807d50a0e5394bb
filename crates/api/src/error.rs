//! API error type with HTTP response mapping.
//!
//! Every failure leaves the server as `{"success": false, "message": ...}`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use serde_json::json;

/// Message sent in place of internal error details.
pub const SERVER_ERROR: &str = "Server Error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain or store failure.
    Domain(DomainError),
}

impl ApiError {
    /// Status code and client-facing message.
    fn parts(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Domain(err) => domain_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = ?self, "internal server error");
        } else {
            tracing::debug!(%status, %message, "request rejected");
        }
        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = json!({ "success": false, "message": message });
        (status, Json(body)).into_response()
    }
}

fn domain_error_to_response(err: &DomainError) -> (StatusCode, String) {
    let status = match err {
        DomainError::BadRequest(_)
        | DomainError::Validation(_)
        | DomainError::Duplicate { .. } => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized | DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::PasswordHash
        | DomainError::Token(_)
        | DomainError::Serialization(_)
        | DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if err.is_internal() {
        (status, SERVER_ERROR.to_string())
    } else {
        (status, err.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
