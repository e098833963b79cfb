//! Persistence errors

use thiserror::Error;

/// Errors from the SQLite persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid value in {table}.{column}: {value}")]
    InvalidColumn {
        table: String,
        column: String,
        value: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PersistenceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_column(
        table: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        PersistenceError::InvalidColumn {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PersistenceError::not_found("Lead", "abc-123");
        assert_eq!(err.to_string(), "Lead not found: abc-123");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_column_display() {
        let err = PersistenceError::invalid_column("leads", "status", "bogus");
        assert_eq!(err.to_string(), "Invalid value in leads.status: bogus");
    }
}
