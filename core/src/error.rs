//! Error taxonomy for booking and payment operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::BookingId;

/// Result type alias for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// A single offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as seen by the caller
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// A required field that was not supplied
    #[must_use]
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            message: "is required".to_string(),
        }
    }

    /// A field that was supplied but is unusable
    #[must_use]
    pub fn invalid(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Errors surfaced by the booking stores and lifecycle.
///
/// Business-rule violations are always returned to the caller. Storage
/// failures keep the original driver message for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    // ═══════════════════════════════════════════════════════════
    // Caller errors
    // ═══════════════════════════════════════════════════════════

    /// Required input missing or malformed.
    #[error("Validation failed: {}", join_fields(.fields))]
    Validation {
        /// Every offending field
        fields: Vec<FieldError>,
    },

    /// Referenced booking does not exist.
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// Principal may not perform this operation.
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Why access was refused
        reason: String,
    },

    /// Malformed identifier.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ═══════════════════════════════════════════════════════════
    // Storage errors
    // ═══════════════════════════════════════════════════════════

    /// A uniqueness constraint rejected the write.
    ///
    /// Retry with a fresh payment reference.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient infrastructure failure.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl BookingError {
    /// Validation error for a single missing field
    #[must_use]
    pub fn missing(field: &str) -> Self {
        Self::Validation {
            fields: vec![FieldError::missing(field)],
        }
    }

    /// Permission error with a reason
    #[must_use]
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the caller can fix the request.
    ///
    /// # Examples
    ///
    /// ```
    /// # use boxoffice_core::BookingError;
    /// assert!(BookingError::missing("seats").is_user_error());
    /// assert!(!BookingError::StorageUnavailable("timeout".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound(_)
                | Self::PermissionDenied { .. }
                | Self::InvalidArgument(_)
        )
    }

    /// Returns `true` if repeating the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
