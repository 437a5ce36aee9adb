//! # AppError
//!
//! Centralized error handling for the Siteline workspace.
//! Maps domain-specific failures to the route boundary's taxonomy.

use serde::Serialize;
use thiserror::Error;

/// One offending field from a rejected form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The primary error type for all sl-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced parent or resource absent
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Field-level rejection; no write was performed
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// No session principal; routes answer with a redirect, not a hard error
    #[error("sign-in required")]
    Unauthenticated,

    /// Authenticated but not allowed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Duplicate unique field on create or update
    #[error("conflict: {0}")]
    Conflict(String),

    /// Remote media host or mail transport failure
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// Infrastructure failure (DB down, disk full, template broken)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    /// Single-field validation shortcut.
    pub fn field(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

/// A specialized Result type for Siteline logic.
pub type Result<T> = std::result::Result<T, AppError>;
