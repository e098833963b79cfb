//! Repository implementations for SQLite
//!
//! CRUD and query operations for leads, users, notes and follow-ups. Lead
//! updates are conditional on the previously read status (per-record
//! compare-and-swap) so concurrent transitions can never both win silently.

use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::{FollowUpRow, LeadRow, NoteRow, UserRow};
use leadflow_core::{FollowUp, Lead, LeadStatus, Note, Team, User};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Open leads count toward the pipeline and load balancing
const OPEN_LEADS: &str = "status NOT IN ('won', 'lost') AND is_archived = 0";

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the `users` table
pub struct UserRepo;

impl UserRepo {
    pub async fn insert(pool: &SqlitePool, user: &User) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, team, role, is_active, leads_created, \
             leads_converted, campaigns_managed, total_revenue, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.team.as_str())
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.leads_created)
        .bind(user.leads_converted)
        .bind(user.campaigns_managed)
        .bind(user.total_revenue.to_string())
        .bind(user.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> PersistenceResult<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| PersistenceError::not_found("User", id))?;
        User::try_from(row)
    }

    pub async fn all(pool: &SqlitePool) -> PersistenceResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY rowid")
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Active members of a team, in insertion order (the assignment
    /// tie-break order).
    pub async fn active_by_team(pool: &SqlitePool, team: Team) -> PersistenceResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE team = ? AND is_active = 1 ORDER BY rowid",
        )
        .bind(team.as_str())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn set_active(pool: &SqlitePool, id: &str, active: bool) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn increment_leads_created(pool: &SqlitePool, id: &str) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE users SET leads_created = leads_created + 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("User", id));
        }
        Ok(())
    }

    /// Record a won deal for the owner: conversion count plus revenue.
    pub async fn record_conversion(
        pool: &SqlitePool,
        id: &str,
        revenue: Decimal,
    ) -> PersistenceResult<()> {
        let user = Self::get_by_id(pool, id).await?;
        let total = user.total_revenue + revenue;

        sqlx::query(
            "UPDATE users SET leads_converted = leads_converted + 1, total_revenue = ? WHERE id = ?",
        )
        .bind(total.to_string())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Lead Repository
// ============================================================================

/// Repository for the `leads` table
pub struct LeadRepo;

impl LeadRepo {
    pub async fn insert(pool: &SqlitePool, lead: &Lead) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO leads (id, name, artist_name, source, platform, assigned_to, team, \
             status, priority, quality, email, phone, budget, deal_value, commission, \
             commission_rate, monthly_listeners, instagram, tiktok_handle, website, label, \
             lead_score, follow_up_count, lost_reason, first_contact_date, last_contact_date, \
             last_activity_date, won_date, lost_date, next_follow_up, is_archived, created_at, \
             updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
             ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lead.id.to_string())
        .bind(&lead.name)
        .bind(&lead.artist_name)
        .bind(lead.source.as_str())
        .bind(lead.platform.as_str())
        .bind(&lead.assigned_to)
        .bind(lead.team.as_str())
        .bind(lead.status.as_str())
        .bind(lead.priority.as_str())
        .bind(lead.quality.as_str())
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.budget.map(|d| d.to_string()))
        .bind(lead.deal_value.map(|d| d.to_string()))
        .bind(lead.commission.map(|d| d.to_string()))
        .bind(lead.commission_rate.map(|d| d.to_string()))
        .bind(lead.monthly_listeners)
        .bind(&lead.instagram)
        .bind(&lead.tiktok_handle)
        .bind(&lead.website)
        .bind(&lead.label)
        .bind(lead.lead_score as i64)
        .bind(lead.follow_up_count)
        .bind(lead.lost_reason.map(|r| r.as_str()))
        .bind(lead.first_contact_date)
        .bind(lead.last_contact_date)
        .bind(lead.last_activity_date)
        .bind(lead.won_date)
        .bind(lead.lost_date)
        .bind(lead.next_follow_up)
        .bind(lead.is_archived)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> PersistenceResult<Lead> {
        let row = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Lead", id.to_string()))?;
        Lead::try_from(row)
    }

    /// Conditional full-row update: succeeds only while the stored status
    /// still matches `expected_status`. Returns the number of rows written
    /// (0 means a concurrent transition got there first).
    pub async fn update_guarded(
        pool: &SqlitePool,
        lead: &Lead,
        expected_status: LeadStatus,
    ) -> PersistenceResult<u64> {
        let result = sqlx::query(
            "UPDATE leads SET name = ?, artist_name = ?, assigned_to = ?, team = ?, status = ?, \
             priority = ?, quality = ?, email = ?, phone = ?, budget = ?, deal_value = ?, \
             commission = ?, commission_rate = ?, monthly_listeners = ?, instagram = ?, \
             tiktok_handle = ?, website = ?, label = ?, lead_score = ?, follow_up_count = ?, \
             lost_reason = ?, first_contact_date = ?, last_contact_date = ?, \
             last_activity_date = ?, won_date = ?, lost_date = ?, next_follow_up = ?, \
             is_archived = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(&lead.name)
        .bind(&lead.artist_name)
        .bind(&lead.assigned_to)
        .bind(lead.team.as_str())
        .bind(lead.status.as_str())
        .bind(lead.priority.as_str())
        .bind(lead.quality.as_str())
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.budget.map(|d| d.to_string()))
        .bind(lead.deal_value.map(|d| d.to_string()))
        .bind(lead.commission.map(|d| d.to_string()))
        .bind(lead.commission_rate.map(|d| d.to_string()))
        .bind(lead.monthly_listeners)
        .bind(&lead.instagram)
        .bind(&lead.tiktok_handle)
        .bind(&lead.website)
        .bind(&lead.label)
        .bind(lead.lead_score as i64)
        .bind(lead.follow_up_count)
        .bind(lead.lost_reason.map(|r| r.as_str()))
        .bind(lead.first_contact_date)
        .bind(lead.last_contact_date)
        .bind(lead.last_activity_date)
        .bind(lead.won_date)
        .bind(lead.lost_date)
        .bind(lead.next_follow_up)
        .bind(lead.is_archived)
        .bind(lead.updated_at)
        .bind(lead.id.to_string())
        .bind(expected_status.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn open_count_by_team(pool: &SqlitePool, team: Team) -> PersistenceResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM leads WHERE team = ? AND {OPEN_LEADS}"
        ))
        .bind(team.as_str())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn open_count_by_owner(pool: &SqlitePool, owner: &str) -> PersistenceResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM leads WHERE assigned_to = ? AND {OPEN_LEADS}"
        ))
        .bind(owner)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn list_by_status(
        pool: &SqlitePool,
        status: LeadStatus,
    ) -> PersistenceResult<Vec<Lead>> {
        let rows = sqlx::query_as::<_, LeadRow>(
            "SELECT * FROM leads WHERE status = ? AND is_archived = 0 ORDER BY created_at DESC",
        )
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(Lead::try_from).collect()
    }

    pub async fn list_open_by_team(pool: &SqlitePool, team: Team) -> PersistenceResult<Vec<Lead>> {
        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT * FROM leads WHERE team = ? AND {OPEN_LEADS} ORDER BY created_at DESC"
        ))
        .bind(team.as_str())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(Lead::try_from).collect()
    }

    /// Active-pipeline counts per status (archived leads excluded)
    pub async fn status_counts(pool: &SqlitePool) -> PersistenceResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM leads WHERE is_archived = 0 \
             GROUP BY status ORDER BY COUNT(*) DESC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn archive(pool: &SqlitePool, id: Uuid) -> PersistenceResult<()> {
        let result =
            sqlx::query("UPDATE leads SET is_archived = 1, updated_at = ? WHERE id = ?")
                .bind(chrono::Utc::now())
                .bind(id.to_string())
                .execute(pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Lead", id.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Note Repository
// ============================================================================

/// Repository for the `notes` table
pub struct NoteRepo;

impl NoteRepo {
    pub async fn insert(pool: &SqlitePool, note: &Note) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO notes (id, lead_id, author, content, note_type, is_private, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(note.id.to_string())
        .bind(note.lead_id.to_string())
        .bind(&note.author)
        .bind(&note.content)
        .bind(note.note_type.as_str())
        .bind(note.is_private)
        .bind(note.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn for_lead(pool: &SqlitePool, lead_id: Uuid) -> PersistenceResult<Vec<Note>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE lead_id = ? ORDER BY created_at",
        )
        .bind(lead_id.to_string())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(Note::try_from).collect()
    }
}

// ============================================================================
// FollowUp Repository
// ============================================================================

/// Repository for the `follow_ups` table
pub struct FollowUpRepo;

impl FollowUpRepo {
    pub async fn insert(pool: &SqlitePool, follow_up: &FollowUp) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO follow_ups (id, lead_id, scheduled_by, due_at, kind, completed, \
             completed_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(follow_up.id.to_string())
        .bind(follow_up.lead_id.to_string())
        .bind(&follow_up.scheduled_by)
        .bind(follow_up.due_at)
        .bind(follow_up.kind.as_str())
        .bind(follow_up.completed)
        .bind(follow_up.completed_at)
        .bind(follow_up.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> PersistenceResult<FollowUp> {
        let row = sqlx::query_as::<_, FollowUpRow>("SELECT * FROM follow_ups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| PersistenceError::not_found("FollowUp", id.to_string()))?;
        FollowUp::try_from(row)
    }

    pub async fn for_lead(pool: &SqlitePool, lead_id: Uuid) -> PersistenceResult<Vec<FollowUp>> {
        let rows = sqlx::query_as::<_, FollowUpRow>(
            "SELECT * FROM follow_ups WHERE lead_id = ? ORDER BY due_at",
        )
        .bind(lead_id.to_string())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(FollowUp::try_from).collect()
    }

    pub async fn mark_completed(pool: &SqlitePool, id: Uuid) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE follow_ups SET completed = 1, completed_at = ? WHERE id = ? AND completed = 0",
        )
        .bind(chrono::Utc::now())
        .bind(id.to_string())
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("FollowUp", id.to_string()));
        }
        Ok(())
    }
}
