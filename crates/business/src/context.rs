//! Service context - shared access to the store, cipher and audit trail

use crate::assignment::AssignmentConfig;
use crate::error::BusinessResult;
use leadflow_audit::{AuditActor, AuditConfig, AuditFact, AuditTrail};
use leadflow_core::Actor;
use leadflow_crypto::FieldCipher;
use sqlx::SqlitePool;

/// Context for business operations.
///
/// Holds no mutable state across requests; all shared-resource
/// coordination happens by re-reading the store at each decision point.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    cipher: FieldCipher,
    audit: AuditTrail,
    assignment: AssignmentConfig,
}

impl ServiceContext {
    pub fn new(
        pool: SqlitePool,
        cipher: FieldCipher,
        audit_config: AuditConfig,
        assignment: AssignmentConfig,
    ) -> Self {
        let audit = AuditTrail::new(pool.clone(), audit_config);
        Self {
            pool,
            cipher,
            audit,
            assignment,
        }
    }

    /// Create core and audit schemas (idempotent)
    pub async fn init(&self) -> BusinessResult<()> {
        leadflow_persistence::run_migrations(&self.pool).await?;
        self.audit.init().await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn assignment(&self) -> &AssignmentConfig {
        &self.assignment
    }

    /// Append an audit fact after the business write is durable.
    ///
    /// Fire-and-forget: the trail retries once and logs a persistent
    /// failure; the triggering operation never fails because of it.
    pub async fn record_audit(&self, fact: AuditFact) {
        self.audit.record_or_log(fact).await;
    }

    /// Decrypt a stored field at the read boundary, degrading to the raw
    /// stored value on failure rather than failing the read.
    pub fn decrypt_or_raw(&self, stored: &str) -> String {
        match self.cipher.decrypt(stored) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                tracing::warn!(error = %err, "field decryption failed; returning stored value");
                stored.to_string()
            }
        }
    }
}

/// Map the trusted caller identity onto the audit actor shape
pub fn audit_actor(actor: &Actor) -> AuditActor {
    AuditActor::user(actor.user_id.clone(), actor.email.clone(), actor.name.clone())
}
