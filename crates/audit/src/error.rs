//! Audit trail errors

use thiserror::Error;

/// Errors from the audit trail.
///
/// These never propagate as the failure of the business operation they
/// describe; callers log them and continue.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit record not found: {0}")]
    NotFound(String),

    #[error("Invalid value in audit_records.{column}: {value}")]
    InvalidColumn { column: String, value: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

impl AuditError {
    pub fn invalid_column(column: impl Into<String>, value: impl Into<String>) -> Self {
        AuditError::InvalidColumn {
            column: column.into(),
            value: value.into(),
        }
    }
}
