//! Record validation run before every write.

use serde::Serialize;

/// A single failed constraint on a record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `source.city`).
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

/// Accumulated validation failures for one record.
///
/// Writes are rejected with the whole list rather than the first failure, so
/// clients can fix every field in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty error list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list holding a single error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Records a failed constraint.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Appends every error from `other`.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Returns true if no constraint failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded errors in insertion order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if an error was recorded for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Converts the list into a result, `Ok` when empty.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Records an error if `value` is blank.
    pub fn require_text(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.push(field, message);
        }
    }

    /// Records an error if `value` is negative or not a finite number.
    pub fn require_non_negative(&mut self, field: &str, value: f64, message: &str) {
        if !value.is_finite() || value < 0.0 {
            self.push(field, message);
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Implemented by every record type the store persists.
pub trait Validate {
    /// Checks the record's schema constraints.
    fn validate(&self) -> Result<(), ValidationErrors>;
}
