//! Audit record types
//!
//! An `AuditFact` is what a caller submits; the trail turns it into an
//! immutable `AuditRecord` by filling in identity, timestamp, category and
//! inferred severity. Once written, only `is_archived`/`archived_at` and
//! `tags` may change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Audit categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Authorization,
    DataAccess,
    DataModification,
    System,
    Security,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Authentication => "authentication",
            AuditCategory::Authorization => "authorization",
            AuditCategory::DataAccess => "data_access",
            AuditCategory::DataModification => "data_modification",
            AuditCategory::System => "system",
            AuditCategory::Security => "security",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "authentication" => Some(AuditCategory::Authentication),
            "authorization" => Some(AuditCategory::Authorization),
            "data_access" => Some(AuditCategory::DataAccess),
            "data_modification" => Some(AuditCategory::DataModification),
            "system" => Some(AuditCategory::System),
            "security" => Some(AuditCategory::Security),
            _ => None,
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity levels - ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "low",
            AuditSeverity::Medium => "medium",
            AuditSeverity::High => "high",
            AuditSeverity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(AuditSeverity::Low),
            "medium" => Some(AuditSeverity::Medium),
            "high" => Some(AuditSeverity::High),
            "critical" => Some(AuditSeverity::Critical),
            _ => None,
        }
    }

    /// All severities at or above `min`, for IN-list filters
    pub fn at_or_above(min: AuditSeverity) -> Vec<AuditSeverity> {
        [
            AuditSeverity::Low,
            AuditSeverity::Medium,
            AuditSeverity::High,
            AuditSeverity::Critical,
        ]
        .into_iter()
        .filter(|s| *s >= min)
        .collect()
    }

    /// Severity when the caller supplied none: security or failure is
    /// high; modifications and authorization are medium; the rest low.
    pub fn inferred(category: AuditCategory, success: bool) -> Self {
        if category == AuditCategory::Security || !success {
            AuditSeverity::High
        } else if matches!(
            category,
            AuditCategory::DataModification | AuditCategory::Authorization
        ) {
            AuditSeverity::Medium
        } else {
            AuditSeverity::Low
        }
    }
}

impl PartialOrd for AuditSeverity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AuditSeverity {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed action taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    LoginFailed,
    Logout,
    PermissionChanged,
    AccessDenied,
    LeadCreated,
    LeadViewed,
    LeadUpdated,
    LeadStatusChanged,
    LeadReassigned,
    LeadArchived,
    NoteAdded,
    FollowUpScheduled,
    FollowUpCompleted,
    UserCreated,
    UserUpdated,
    UserDeleted,
    DataExported,
    SchemaMigrated,
    RetentionRun,
    SuspiciousActivityDetected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::PermissionChanged => "permission_changed",
            AuditAction::AccessDenied => "access_denied",
            AuditAction::LeadCreated => "lead_created",
            AuditAction::LeadViewed => "lead_viewed",
            AuditAction::LeadUpdated => "lead_updated",
            AuditAction::LeadStatusChanged => "lead_status_changed",
            AuditAction::LeadReassigned => "lead_reassigned",
            AuditAction::LeadArchived => "lead_archived",
            AuditAction::NoteAdded => "note_added",
            AuditAction::FollowUpScheduled => "follow_up_scheduled",
            AuditAction::FollowUpCompleted => "follow_up_completed",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserUpdated => "user_updated",
            AuditAction::UserDeleted => "user_deleted",
            AuditAction::DataExported => "data_exported",
            AuditAction::SchemaMigrated => "schema_migrated",
            AuditAction::RetentionRun => "retention_run",
            AuditAction::SuspiciousActivityDetected => "suspicious_activity_detected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "login" => Some(AuditAction::Login),
            "login_failed" => Some(AuditAction::LoginFailed),
            "logout" => Some(AuditAction::Logout),
            "permission_changed" => Some(AuditAction::PermissionChanged),
            "access_denied" => Some(AuditAction::AccessDenied),
            "lead_created" => Some(AuditAction::LeadCreated),
            "lead_viewed" => Some(AuditAction::LeadViewed),
            "lead_updated" => Some(AuditAction::LeadUpdated),
            "lead_status_changed" => Some(AuditAction::LeadStatusChanged),
            "lead_reassigned" => Some(AuditAction::LeadReassigned),
            "lead_archived" => Some(AuditAction::LeadArchived),
            "note_added" => Some(AuditAction::NoteAdded),
            "follow_up_scheduled" => Some(AuditAction::FollowUpScheduled),
            "follow_up_completed" => Some(AuditAction::FollowUpCompleted),
            "user_created" => Some(AuditAction::UserCreated),
            "user_updated" => Some(AuditAction::UserUpdated),
            "user_deleted" => Some(AuditAction::UserDeleted),
            "data_exported" => Some(AuditAction::DataExported),
            "schema_migrated" => Some(AuditAction::SchemaMigrated),
            "retention_run" => Some(AuditAction::RetentionRun),
            "suspicious_activity_detected" => Some(AuditAction::SuspiciousActivityDetected),
            _ => None,
        }
    }

    /// Category when the caller supplies none
    pub fn default_category(&self) -> AuditCategory {
        use AuditAction::*;

        match self {
            Login | LoginFailed | Logout => AuditCategory::Authentication,
            PermissionChanged | AccessDenied => AuditCategory::Authorization,
            LeadViewed | DataExported => AuditCategory::DataAccess,
            LeadCreated | LeadUpdated | LeadStatusChanged | LeadReassigned | LeadArchived
            | NoteAdded | FollowUpScheduled | FollowUpCompleted | UserCreated | UserUpdated
            | UserDeleted => AuditCategory::DataModification,
            SchemaMigrated | RetentionRun => AuditCategory::System,
            SuspiciousActivityDetected => AuditCategory::Security,
        }
    }

    /// Identity-affecting actions are always GDPR-relevant
    pub fn is_gdpr_relevant(&self) -> bool {
        matches!(
            self,
            AuditAction::UserCreated
                | AuditAction::UserUpdated
                | AuditAction::UserDeleted
                | AuditAction::DataExported
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who performed the action.
///
/// `user_id` is None only for anonymous failed-login attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditActor {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuditActor {
    pub fn user(
        user_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: Some(email.into()),
            name: Some(name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Request context carried onto the record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
}

impl RequestContext {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            ..Self::default()
        }
    }

    pub fn request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// A fact submitted to the trail. Severity and category are optional;
/// the trail infers them when absent.
#[derive(Debug, Clone)]
pub struct AuditFact {
    pub action: AuditAction,
    pub actor: AuditActor,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub context: RequestContext,
    pub category: Option<AuditCategory>,
    pub severity: Option<AuditSeverity>,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_fields: Vec<String>,
    pub gdpr_relevant: bool,
    pub data_subject: Option<String>,
    pub retention_period_days: Option<i64>,
    pub tags: Vec<String>,
}

impl AuditFact {
    pub fn new(action: AuditAction, actor: AuditActor) -> Self {
        Self {
            action,
            actor,
            resource_type: None,
            resource_id: None,
            resource_name: None,
            success: true,
            error_message: None,
            context: RequestContext::default(),
            category: None,
            severity: None,
            previous_data: None,
            new_data: None,
            changed_fields: Vec::new(),
            gdpr_relevant: false,
            data_subject: None,
            retention_period_days: None,
            tags: Vec::new(),
        }
    }

    pub fn resource(mut self, resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(id.into());
        self
    }

    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn changes(
        mut self,
        previous: serde_json::Value,
        new: serde_json::Value,
        changed_fields: Vec<String>,
    ) -> Self {
        self.previous_data = Some(previous);
        self.new_data = Some(new);
        self.changed_fields = changed_fields;
        self
    }

    pub fn data_subject(mut self, email: impl Into<String>) -> Self {
        self.data_subject = Some(email.into());
        self
    }

    pub fn gdpr(mut self) -> Self {
        self.gdpr_relevant = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// An immutable fact about an action taken in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub action: AuditAction,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_path: Option<String>,
    pub request_method: Option<String>,
    pub category: AuditCategory,
    pub severity: AuditSeverity,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_fields: Vec<String>,
    pub gdpr_relevant: bool,
    pub data_subject: Option<String>,
    pub retention_period_days: i64,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl AuditRecord {
    /// Seal a fact into a record: assign identity and timestamp, resolve
    /// category, infer severity, apply the GDPR rule and the default
    /// retention window.
    pub fn from_fact(fact: AuditFact, default_retention_days: i64) -> Self {
        let category = fact.category.unwrap_or_else(|| fact.action.default_category());
        let severity = fact
            .severity
            .unwrap_or_else(|| AuditSeverity::inferred(category, fact.success));
        let gdpr_relevant = fact.gdpr_relevant || fact.action.is_gdpr_relevant();

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: fact.actor.user_id,
            user_email: fact.actor.email,
            user_name: fact.actor.name,
            action: fact.action,
            resource_type: fact.resource_type,
            resource_id: fact.resource_id,
            resource_name: fact.resource_name,
            success: fact.success,
            error_message: fact.error_message,
            ip: fact.context.ip,
            user_agent: fact.context.user_agent,
            request_path: fact.context.path,
            request_method: fact.context.method,
            category,
            severity,
            previous_data: fact.previous_data,
            new_data: fact.new_data,
            changed_fields: fact.changed_fields,
            gdpr_relevant,
            data_subject: fact.data_subject,
            retention_period_days: fact.retention_period_days.unwrap_or(default_retention_days),
            is_archived: false,
            archived_at: None,
            tags: fact.tags,
        }
    }
}
