//! # User Module
//!
//! Account-team members that own leads, plus the authenticated `Actor`
//! identity the core trusts from its caller. Permission checks use a closed
//! capability table keyed by role - no free-form resource/action strings.

use crate::lead::Team;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// Capability lookup table.
    ///
    /// Admin holds every capability; managers everything except user
    /// management; members work their own pipeline.
    pub fn allows(&self, capability: Capability) -> bool {
        use Capability::*;

        match self {
            Role::Admin => true,
            Role::Manager => !matches!(capability, ManageUsers),
            Role::Member => matches!(capability, ViewLeads | CreateLeads | EditLeads),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed enumeration of (resource, action) capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewLeads,
    CreateLeads,
    EditLeads,
    ReassignLeads,
    ArchiveLeads,
    ViewAudit,
    ManageUsers,
    ExportData,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewLeads => "view_leads",
            Capability::CreateLeads => "create_leads",
            Capability::EditLeads => "edit_leads",
            Capability::ReassignLeads => "reassign_leads",
            Capability::ArchiveLeads => "archive_leads",
            Capability::ViewAudit => "view_audit",
            Capability::ManageUsers => "manage_users",
            Capability::ExportData => "export_data",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account-team member.
///
/// Referenced by leads as owner; workload counters feed the least-loaded
/// assignment pick and conversion reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub team: Team,
    pub role: Role,
    pub is_active: bool,
    pub leads_created: i64,
    pub leads_converted: i64,
    pub campaigns_managed: i64,
    pub total_revenue: Decimal,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        team: Team,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            team,
            role,
            is_active: true,
            leads_created: 0,
            leads_converted: 0,
            campaigns_managed: 0,
            total_revenue: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Authenticated identity for this user, as passed into the services
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            team: self.team,
            role: self.role,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User {} ({}, team: {}, role: {}, active: {})",
            self.id, self.name, self.team, self.role, self.is_active
        )
    }
}

/// Already-authenticated caller identity.
///
/// The core performs no credential verification; it trusts this struct as
/// supplied by the caller's auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub team: Team,
    pub role: Role,
}

impl Actor {
    /// Precondition check used at service entry points
    pub fn require(&self, capability: Capability) -> crate::error::CoreResult<()> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(crate::error::CoreError::PermissionDenied(format!(
                "{} requires {}",
                self.user_id, capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_table() {
        assert!(Role::Admin.allows(Capability::ManageUsers));
        assert!(Role::Admin.allows(Capability::ReassignLeads));

        assert!(Role::Manager.allows(Capability::ReassignLeads));
        assert!(Role::Manager.allows(Capability::ViewAudit));
        assert!(!Role::Manager.allows(Capability::ManageUsers));

        assert!(Role::Member.allows(Capability::ViewLeads));
        assert!(Role::Member.allows(Capability::CreateLeads));
        assert!(!Role::Member.allows(Capability::ReassignLeads));
        assert!(!Role::Member.allows(Capability::ViewAudit));
    }

    #[test]
    fn test_actor_require() {
        let user = User::new("USR_001", "Maya", "maya@agency.example", Team::Social, Role::Member);
        let actor = user.actor();

        assert!(actor.require(Capability::EditLeads).is_ok());

        let err = actor.require(Capability::ViewAudit).unwrap_err();
        assert!(err.to_string().contains("USR_001"));
        assert!(err.to_string().contains("view_audit"));
    }

    #[test]
    fn test_new_user_counters_zeroed() {
        let user = User::new("USR_002", "Jonas", "jonas@agency.example", Team::Streaming, Role::Manager);

        assert!(user.is_active);
        assert_eq!(user.leads_created, 0);
        assert_eq!(user.leads_converted, 0);
        assert_eq!(user.total_revenue, Decimal::ZERO);
    }
}
