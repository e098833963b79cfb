//! Leadflow Business - Service layer
//!
//! Lead capture, assignment, the status state machine and its side
//! effects, built over the persistence repositories, the field cipher and
//! the audit trail.
//!
//! ## Ordering guarantees
//!
//! Audit facts are appended only after the business write they describe is
//! durable, and a trail failure never aborts the operation (it is retried
//! once, then logged as an alertable gap). The lead store write itself is
//! a per-record compare-and-swap; a concurrent transition surfaces as
//! [`error::BusinessError::ConcurrentUpdate`].

pub mod assignment;
pub mod context;
pub mod error;
pub mod leads;

pub use assignment::{routed_team, Assignment, AssignmentConfig, AssignmentEngine};
pub use context::{audit_actor, ServiceContext};
pub use error::{BusinessError, BusinessResult};
pub use leads::{CaptureLead, LeadPatch, LeadService, TransitionOpts};
