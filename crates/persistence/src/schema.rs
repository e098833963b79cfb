//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables, plus conversions into the
//! domain types. Decimal columns are stored as TEXT to avoid float money.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use leadflow_core::{
    FollowUp, FollowUpKind, Lead, LeadQuality, LeadSource, LeadStatus, LostReason, Note, NoteType,
    Platform, Priority, Role, Team, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Row type for the `users` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub team: String,
    pub role: String,
    pub is_active: bool,
    pub leads_created: i64,
    pub leads_converted: i64,
    pub campaigns_managed: i64,
    pub total_revenue: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for the `leads` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LeadRow {
    pub id: String,
    pub name: String,
    pub artist_name: Option<String>,
    pub source: String,
    pub platform: String,
    pub assigned_to: String,
    pub team: String,
    pub status: String,
    pub priority: String,
    pub quality: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget: Option<String>,
    pub deal_value: Option<String>,
    pub commission: Option<String>,
    pub commission_rate: Option<String>,
    pub monthly_listeners: Option<i64>,
    pub instagram: Option<String>,
    pub tiktok_handle: Option<String>,
    pub website: Option<String>,
    pub label: Option<String>,
    pub lead_score: i64,
    pub follow_up_count: i64,
    pub lost_reason: Option<String>,
    pub first_contact_date: Option<DateTime<Utc>>,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub won_date: Option<DateTime<Utc>>,
    pub lost_date: Option<DateTime<Utc>>,
    pub next_follow_up: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for the `notes` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub lead_id: String,
    pub author: String,
    pub content: String,
    pub note_type: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// Row type for the `follow_ups` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct FollowUpRow {
    pub id: String,
    pub lead_id: String,
    pub scheduled_by: String,
    pub due_at: DateTime<Utc>,
    pub kind: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn parse_uuid(table: &str, column: &str, value: &str) -> PersistenceResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| PersistenceError::invalid_column(table, column, value))
}

fn parse_decimal(
    table: &str,
    column: &str,
    value: Option<&str>,
) -> PersistenceResult<Option<Decimal>> {
    value
        .map(|v| {
            Decimal::from_str(v).map_err(|_| PersistenceError::invalid_column(table, column, v))
        })
        .transpose()
}

impl TryFrom<UserRow> for User {
    type Error = PersistenceError;

    fn try_from(row: UserRow) -> PersistenceResult<User> {
        let team = Team::from_str(&row.team)
            .ok_or_else(|| PersistenceError::invalid_column("users", "team", &row.team))?;
        let role = Role::from_str(&row.role)
            .ok_or_else(|| PersistenceError::invalid_column("users", "role", &row.role))?;
        let total_revenue = parse_decimal("users", "total_revenue", Some(&row.total_revenue))?
            .unwrap_or(Decimal::ZERO);

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            team,
            role,
            is_active: row.is_active,
            leads_created: row.leads_created,
            leads_converted: row.leads_converted,
            campaigns_managed: row.campaigns_managed,
            total_revenue,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<LeadRow> for Lead {
    type Error = PersistenceError;

    fn try_from(row: LeadRow) -> PersistenceResult<Lead> {
        let id = parse_uuid("leads", "id", &row.id)?;
        let source = LeadSource::from_str(&row.source)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "source", &row.source))?;
        let platform = Platform::from_str(&row.platform)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "platform", &row.platform))?;
        let team = Team::from_str(&row.team)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "team", &row.team))?;
        let status = LeadStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "status", &row.status))?;
        let priority = Priority::from_str(&row.priority)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "priority", &row.priority))?;
        let quality = LeadQuality::from_str(&row.quality)
            .ok_or_else(|| PersistenceError::invalid_column("leads", "quality", &row.quality))?;
        let lost_reason = row
            .lost_reason
            .as_deref()
            .map(|v| {
                LostReason::from_str(v)
                    .ok_or_else(|| PersistenceError::invalid_column("leads", "lost_reason", v))
            })
            .transpose()?;

        Ok(Lead {
            id,
            name: row.name,
            artist_name: row.artist_name,
            source,
            platform,
            assigned_to: row.assigned_to,
            team,
            status,
            priority,
            quality,
            email: row.email,
            phone: row.phone,
            budget: parse_decimal("leads", "budget", row.budget.as_deref())?,
            deal_value: parse_decimal("leads", "deal_value", row.deal_value.as_deref())?,
            commission: parse_decimal("leads", "commission", row.commission.as_deref())?,
            commission_rate: parse_decimal(
                "leads",
                "commission_rate",
                row.commission_rate.as_deref(),
            )?,
            monthly_listeners: row.monthly_listeners,
            instagram: row.instagram,
            tiktok_handle: row.tiktok_handle,
            website: row.website,
            label: row.label,
            lead_score: row.lead_score.clamp(0, 100) as u8,
            follow_up_count: row.follow_up_count,
            lost_reason,
            first_contact_date: row.first_contact_date,
            last_contact_date: row.last_contact_date,
            last_activity_date: row.last_activity_date,
            won_date: row.won_date,
            lost_date: row.lost_date,
            next_follow_up: row.next_follow_up,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<NoteRow> for Note {
    type Error = PersistenceError;

    fn try_from(row: NoteRow) -> PersistenceResult<Note> {
        let id = parse_uuid("notes", "id", &row.id)?;
        let lead_id = parse_uuid("notes", "lead_id", &row.lead_id)?;
        let note_type = NoteType::from_str(&row.note_type)
            .ok_or_else(|| PersistenceError::invalid_column("notes", "note_type", &row.note_type))?;

        Ok(Note {
            id,
            lead_id,
            author: row.author,
            content: row.content,
            note_type,
            is_private: row.is_private,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<FollowUpRow> for FollowUp {
    type Error = PersistenceError;

    fn try_from(row: FollowUpRow) -> PersistenceResult<FollowUp> {
        let id = parse_uuid("follow_ups", "id", &row.id)?;
        let lead_id = parse_uuid("follow_ups", "lead_id", &row.lead_id)?;
        let kind = FollowUpKind::from_str(&row.kind)
            .ok_or_else(|| PersistenceError::invalid_column("follow_ups", "kind", &row.kind))?;

        Ok(FollowUp {
            id,
            lead_id,
            scheduled_by: row.scheduled_by,
            due_at: row.due_at,
            kind,
            completed: row.completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_row() -> LeadRow {
        LeadRow {
            id: Uuid::new_v4().to_string(),
            name: "Nova Waves".to_string(),
            artist_name: None,
            source: "referral".to_string(),
            platform: "spotify".to_string(),
            assigned_to: "USR_001".to_string(),
            team: "streaming".to_string(),
            status: "new".to_string(),
            priority: "medium".to_string(),
            quality: "cold".to_string(),
            email: None,
            phone: None,
            budget: Some("12000".to_string()),
            deal_value: None,
            commission: None,
            commission_rate: None,
            monthly_listeners: Some(150_000),
            instagram: None,
            tiktok_handle: None,
            website: None,
            label: None,
            lead_score: 70,
            follow_up_count: 0,
            lost_reason: None,
            first_contact_date: None,
            last_contact_date: None,
            last_activity_date: None,
            won_date: None,
            lost_date: None,
            next_follow_up: None,
            is_archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_lead_row_conversion() {
        let lead = Lead::try_from(lead_row()).unwrap();

        assert_eq!(lead.source, LeadSource::Referral);
        assert_eq!(lead.team, Team::Streaming);
        assert_eq!(lead.budget, Some(Decimal::from(12_000)));
        assert_eq!(lead.lead_score, 70);
    }

    #[test]
    fn test_bad_enum_value_rejected() {
        let mut row = lead_row();
        row.status = "exploded".to_string();

        let err = Lead::try_from(row).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value in leads.status: exploded");
    }

    #[test]
    fn test_bad_decimal_rejected() {
        let mut row = lead_row();
        row.budget = Some("not-a-number".to_string());

        let err = Lead::try_from(row).unwrap_err();
        assert!(err.to_string().contains("leads.budget"));
    }
}
