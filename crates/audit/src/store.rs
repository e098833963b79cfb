//! Audit record store - append-only SQLite table
//!
//! The trail owns its own table, separate from the business tables. Writes
//! are inserts only; the sole permitted updates are the archive flags and
//! tags. There is no general UPDATE or single-record DELETE.

use crate::error::{AuditError, AuditResult};
use crate::query::AuditQuery;
use crate::record::{AuditAction, AuditCategory, AuditRecord, AuditSeverity};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_records (
    id                     TEXT PRIMARY KEY,
    timestamp              TEXT NOT NULL,
    user_id                TEXT,
    user_email             TEXT,
    user_name              TEXT,
    action                 TEXT NOT NULL,
    resource_type          TEXT,
    resource_id            TEXT,
    resource_name          TEXT,
    success                INTEGER NOT NULL,
    error_message          TEXT,
    ip                     TEXT,
    user_agent             TEXT,
    request_path           TEXT,
    request_method         TEXT,
    category               TEXT NOT NULL,
    severity               TEXT NOT NULL,
    previous_data          TEXT,
    new_data               TEXT,
    changed_fields         TEXT NOT NULL DEFAULT '[]',
    gdpr_relevant          INTEGER NOT NULL DEFAULT 0,
    data_subject           TEXT,
    retention_period_days  INTEGER NOT NULL,
    is_archived            INTEGER NOT NULL DEFAULT 0,
    archived_at            TEXT,
    tags                   TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_records(timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_records(user_id);
CREATE INDEX IF NOT EXISTS idx_audit_resource ON audit_records(resource_type, resource_id);
CREATE INDEX IF NOT EXISTS idx_audit_category ON audit_records(category);
CREATE INDEX IF NOT EXISTS idx_audit_subject ON audit_records(data_subject);
CREATE INDEX IF NOT EXISTS idx_audit_archived ON audit_records(is_archived);
"#;

/// Row type for the `audit_records` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_path: Option<String>,
    pub request_method: Option<String>,
    pub category: String,
    pub severity: String,
    pub previous_data: Option<String>,
    pub new_data: Option<String>,
    pub changed_fields: String,
    pub gdpr_relevant: bool,
    pub data_subject: Option<String>,
    pub retention_period_days: i64,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub tags: String,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> AuditResult<AuditRecord> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|_| AuditError::invalid_column("id", &row.id))?;
        let action = AuditAction::from_str(&row.action)
            .ok_or_else(|| AuditError::invalid_column("action", &row.action))?;
        let category = AuditCategory::from_str(&row.category)
            .ok_or_else(|| AuditError::invalid_column("category", &row.category))?;
        let severity = AuditSeverity::from_str(&row.severity)
            .ok_or_else(|| AuditError::invalid_column("severity", &row.severity))?;
        let previous_data = row
            .previous_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let new_data = row.new_data.as_deref().map(serde_json::from_str).transpose()?;
        let changed_fields: Vec<String> = serde_json::from_str(&row.changed_fields)?;
        let tags: Vec<String> = serde_json::from_str(&row.tags)?;

        Ok(AuditRecord {
            id,
            timestamp: row.timestamp,
            user_id: row.user_id,
            user_email: row.user_email,
            user_name: row.user_name,
            action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            resource_name: row.resource_name,
            success: row.success,
            error_message: row.error_message,
            ip: row.ip,
            user_agent: row.user_agent,
            request_path: row.request_path,
            request_method: row.request_method,
            category,
            severity,
            previous_data,
            new_data,
            changed_fields,
            gdpr_relevant: row.gdpr_relevant,
            data_subject: row.data_subject,
            retention_period_days: row.retention_period_days,
            is_archived: row.is_archived,
            archived_at: row.archived_at,
            tags,
        })
    }
}

/// Grouped failures within the detection window
#[derive(Debug, Clone)]
pub struct FailureGroup {
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub failures: i64,
}

/// SQLite-backed audit store
#[derive(Debug, Clone)]
pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the audit table and indexes (idempotent)
    pub async fn ensure_schema(&self) -> AuditResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Append one record. This is the only write path for record content.
    pub async fn insert(&self, record: &AuditRecord) -> AuditResult<()> {
        let previous_data = record
            .previous_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new_data = record.new_data.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO audit_records (id, timestamp, user_id, user_email, user_name, action, \
             resource_type, resource_id, resource_name, success, error_message, ip, user_agent, \
             request_path, request_method, category, severity, previous_data, new_data, \
             changed_fields, gdpr_relevant, data_subject, retention_period_days, is_archived, \
             archived_at, tags) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.timestamp)
        .bind(&record.user_id)
        .bind(&record.user_email)
        .bind(&record.user_name)
        .bind(record.action.as_str())
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.resource_name)
        .bind(record.success)
        .bind(&record.error_message)
        .bind(&record.ip)
        .bind(&record.user_agent)
        .bind(&record.request_path)
        .bind(&record.request_method)
        .bind(record.category.as_str())
        .bind(record.severity.as_str())
        .bind(previous_data)
        .bind(new_data)
        .bind(serde_json::to_string(&record.changed_fields)?)
        .bind(record.gdpr_relevant)
        .bind(&record.data_subject)
        .bind(record.retention_period_days)
        .bind(record.is_archived)
        .bind(record.archived_at)
        .bind(serde_json::to_string(&record.tags)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> AuditResult<AuditRecord> {
        let row = sqlx::query_as::<_, AuditRow>("SELECT * FROM audit_records WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AuditError::NotFound(id.to_string()))?;
        AuditRecord::try_from(row)
    }

    /// Filtered search, newest first
    pub async fn search(&self, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM audit_records WHERE 1 = 1");

        if let Some(actor) = &query.actor {
            qb.push(" AND user_id = ");
            qb.push_bind(actor.clone());
        }
        if let Some(resource_type) = &query.resource_type {
            qb.push(" AND resource_type = ");
            qb.push_bind(resource_type.clone());
        }
        if let Some(resource_id) = &query.resource_id {
            qb.push(" AND resource_id = ");
            qb.push_bind(resource_id.clone());
        }
        if let Some(category) = query.category {
            qb.push(" AND category = ");
            qb.push_bind(category.as_str());
        }
        if let Some(min) = query.min_severity {
            qb.push(" AND severity IN (");
            let mut separated = qb.separated(", ");
            for severity in AuditSeverity::at_or_above(min) {
                separated.push_bind(severity.as_str());
            }
            qb.push(")");
        }
        if let Some(subject) = &query.data_subject {
            qb.push(" AND data_subject = ");
            qb.push_bind(subject.clone());
        }
        if let Some(from) = query.from {
            qb.push(" AND timestamp >= ");
            qb.push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND timestamp <= ");
            qb.push_bind(to);
        }
        if !query.include_archived {
            qb.push(" AND is_archived = 0");
        }

        qb.push(" ORDER BY timestamp DESC LIMIT ");
        qb.push_bind(query.limit);
        qb.push(" OFFSET ");
        qb.push_bind(query.offset);

        let rows: Vec<AuditRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    /// Failed actions grouped by (actor, ip) since `window_start`
    pub async fn failure_groups(
        &self,
        window_start: DateTime<Utc>,
        min_failures: i64,
    ) -> AuditResult<Vec<FailureGroup>> {
        let rows: Vec<(Option<String>, Option<String>, i64)> = sqlx::query_as(
            "SELECT user_id, ip, COUNT(*) FROM audit_records \
             WHERE success = 0 AND timestamp >= ? \
             GROUP BY user_id, ip \
             HAVING COUNT(*) >= ? \
             ORDER BY COUNT(*) DESC",
        )
        .bind(window_start)
        .bind(min_failures)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, ip, failures)| FailureGroup {
                user_id,
                ip,
                failures,
            })
            .collect())
    }

    /// Actors with at least `min_failures` failed authentication attempts
    /// since `window_start`
    pub async fn failed_auth_actors(
        &self,
        window_start: DateTime<Utc>,
        min_failures: i64,
    ) -> AuditResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM audit_records \
             WHERE success = 0 AND category = 'authentication' \
             AND user_id IS NOT NULL AND timestamp >= ? \
             GROUP BY user_id \
             HAVING COUNT(*) >= ?",
        )
        .bind(window_start)
        .bind(min_failures)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Mark non-archived records older than `cutoff` as archived.
    /// Returns how many records were archived. Never touches records that
    /// are already archived.
    pub async fn archive_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<u64> {
        let result = sqlx::query(
            "UPDATE audit_records SET is_archived = 1, archived_at = ? \
             WHERE is_archived = 0 AND timestamp < ?",
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Hard-delete non-archived records older than `cutoff`. The only
    /// destructive operation on the trail; archived records are never
    /// deleted by any code path.
    pub async fn purge_expired(&self, cutoff: DateTime<Utc>) -> AuditResult<u64> {
        let result =
            sqlx::query("DELETE FROM audit_records WHERE is_archived = 0 AND timestamp < ?")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Replace the tags of one record. Tags and the archive flags are the
    /// only mutable columns post-write.
    pub async fn update_tags(&self, id: Uuid, tags: &[String]) -> AuditResult<()> {
        let result = sqlx::query("UPDATE audit_records SET tags = ? WHERE id = ?")
            .bind(serde_json::to_string(tags)?)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuditError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn count(&self) -> AuditResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
