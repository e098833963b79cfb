//! Business layer errors
//!
//! Every aborted operation surfaces a stable kind plus a human-readable
//! message. Audit-write failures are absent here on purpose: the trail
//! logs them and they never become the operation's own failure.

use leadflow_audit::AuditError;
use leadflow_core::CoreError;
use leadflow_crypto::CryptoError;
use leadflow_persistence::PersistenceError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the business services
#[derive(Debug, Error)]
pub enum BusinessError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Startup/schema failures only. Audit *writes* during business
    /// operations never surface through this type.
    #[error("Audit store error: {0}")]
    Audit(#[from] AuditError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No eligible owner available: {0}")]
    AssignmentUnavailable(String),

    #[error("Lead {0} was modified concurrently; reload and retry")]
    ConcurrentUpdate(Uuid),
}

/// Result type for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

impl BusinessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BusinessError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BusinessError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BusinessError::Persistence(err) if err.is_not_found())
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, BusinessError::Core(CoreError::PermissionDenied(_)))
    }
}
