//! # Error Module
//!
//! Domain errors for Leadflow core using thiserror.

use crate::lead::LeadStatus;
use thiserror::Error;

/// Core domain errors.
///
/// Business-rule failures only; infrastructure errors live in the
/// persistence and audit crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}
