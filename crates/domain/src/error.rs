//! Domain error types.

use document_store::{StoreError, ValidationErrors};
use thiserror::Error;

use crate::auth::TokenError;

/// Message returned for every credential failure on protected routes.
pub const NOT_AUTHORIZED: &str = "Not authorized to access this route";

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request is missing a required value or is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// A record failed validation.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A unique field already holds this value.
    #[error("Duplicate field value entered")]
    Duplicate { field: &'static str },

    /// No usable credential was presented.
    #[error("Not authorized to access this route")]
    Unauthorized,

    /// Login with an unknown email or a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The caller is authenticated but may not perform the action.
    #[error("{0}")]
    Forbidden(String),

    /// The addressed record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Password hashing failed.
    #[error("Password hashing failed")]
    PasswordHash,

    /// A token could not be issued.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn shipment_not_found(id: impl std::fmt::Display) -> Self {
        DomainError::NotFound(format!("Shipment not found with id of {id}"))
    }

    /// Returns true for failures caused by the server rather than the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DomainError::PasswordHash
                | DomainError::Token(_)
                | DomainError::Serialization(_)
                | DomainError::Store(_)
        )
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(errors) => DomainError::Validation(errors),
            StoreError::DuplicateKey { field, .. } => DomainError::Duplicate { field },
            other => DomainError::Store(other),
        }
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}
