//! Leadflow Core - Domain types
//!
//! This crate contains the fundamental types used across Leadflow:
//! - `Lead`: the pipeline aggregate, with the status transition table
//! - `User` / `Actor`: team members and the trusted caller identity
//! - `Note` / `FollowUp`: sub-entities owned by a lead
//! - `score`: the pure 0-100 lead quality score

pub mod error;
pub mod lead;
pub mod note;
pub mod score;
pub mod user;

pub use error::{CoreError, CoreResult};
pub use lead::{
    Lead, LeadQuality, LeadSource, LeadStatus, LostReason, Platform, Priority, Team,
};
pub use note::{FollowUp, FollowUpKind, Note, NoteType};
pub use user::{Actor, Capability, Role, User};
