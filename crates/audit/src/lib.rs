//! Leadflow Audit Trail
//!
//! Append-only record of every state-changing or sensitive-read operation,
//! for compliance and security review.
//!
//! ## Key components
//!
//! - [`record::AuditFact`] / [`record::AuditRecord`] - submitted facts and
//!   the sealed, immutable records they become
//! - [`config::AuditConfig`] - retention and detection thresholds
//! - [`store::AuditStore`] - append-only SQLite table owned by this crate
//! - [`trail::AuditTrail`] - main orchestrator: severity inference,
//!   suspicious-activity detection, retention, read contracts
//!
//! The trail is fire-and-forget from the business caller's perspective:
//! [`trail::AuditTrail::record_or_log`] retries once, then logs the gap and
//! returns `None` without ever failing the triggering operation.

pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod store;
pub mod trail;

pub use config::AuditConfig;
pub use error::{AuditError, AuditResult};
pub use query::AuditQuery;
pub use record::{
    AuditAction, AuditActor, AuditCategory, AuditFact, AuditRecord, AuditSeverity, RequestContext,
};
pub use store::AuditStore;
pub use trail::{AuditTrail, SuspiciousActivity};
