//! Audit query filters
//!
//! Builder-style filter applied by the store; results are always ordered
//! newest first and paginated.

use crate::record::{AuditCategory, AuditSeverity};
use chrono::{DateTime, Utc};

/// Default page size for audit queries
pub const DEFAULT_LIMIT: i64 = 50;

/// Filter for audit record queries
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub category: Option<AuditCategory>,
    pub min_severity: Option<AuditSeverity>,
    pub data_subject: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub include_archived: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            actor: None,
            resource_type: None,
            resource_id: None,
            category: None,
            min_severity: None,
            data_subject: None,
            from: None,
            to: None,
            include_archived: false,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, user_id: impl Into<String>) -> Self {
        self.actor = Some(user_id.into());
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(id.into());
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn data_subject(mut self, email: impl Into<String>) -> Self {
        self.data_subject = Some(email.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn include_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
