use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record failed schema validation and was not written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A unique field already holds this value.
    #[error("Duplicate value for {field}: {value}")]
    DuplicateKey { field: &'static str, value: String },

    /// A stored row could not be mapped back to a record.
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
