//! Audit Trail - main orchestrator
//!
//! Seals submitted facts into immutable records, answers the read
//! contracts (actor history, resource history, security feed, GDPR subject
//! access), detects suspicious activity over a rolling window and applies
//! the retention rules.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::AuditConfig;
use crate::error::AuditResult;
use crate::query::AuditQuery;
use crate::record::{AuditFact, AuditRecord};
use crate::store::AuditStore;
use sqlx::SqlitePool;

/// A reportable cluster of failures from one (actor, ip) pair
#[derive(Debug, Clone)]
pub struct SuspiciousActivity {
    /// None for anonymous failed logins
    pub user_id: Option<String>,
    pub ip: Option<String>,
    /// Failed actions within the window
    pub failure_count: i64,
    /// Set when the actor crossed the failed-authentication threshold.
    /// Enforcement of the lock is the identity collaborator's job.
    pub lock_recommended: bool,
}

/// The audit trail
#[derive(Debug, Clone)]
pub struct AuditTrail {
    store: AuditStore,
    config: AuditConfig,
}

impl AuditTrail {
    pub fn new(pool: SqlitePool, config: AuditConfig) -> Self {
        Self {
            store: AuditStore::new(pool),
            config,
        }
    }

    /// Create the trail's table and indexes (idempotent)
    pub async fn init(&self) -> AuditResult<()> {
        self.store.ensure_schema().await
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Seal and append a fact.
    ///
    /// Callers recording business side effects should use
    /// [`AuditTrail::record_or_log`] instead - a trail failure must never
    /// abort the operation it describes.
    pub async fn record(&self, fact: AuditFact) -> AuditResult<AuditRecord> {
        let record = AuditRecord::from_fact(fact, self.config.retention_period_days);
        self.store.insert(&record).await?;
        Ok(record)
    }

    /// Fire-and-forget append: one retry, then an error log.
    ///
    /// The business fact stands either way; a `None` return means the
    /// compliance trail has a gap that operations must alert on.
    pub async fn record_or_log(&self, fact: AuditFact) -> Option<AuditRecord> {
        let action = fact.action;
        let resource_id = fact.resource_id.clone();

        match self.record(fact.clone()).await {
            Ok(record) => Some(record),
            Err(first) => match self.record(fact).await {
                Ok(record) => {
                    tracing::warn!(
                        action = action.as_str(),
                        error = %first,
                        "audit write succeeded on retry"
                    );
                    Some(record)
                }
                Err(retry) => {
                    tracing::error!(
                        action = action.as_str(),
                        resource_id = resource_id.as_deref().unwrap_or("-"),
                        first_error = %first,
                        retry_error = %retry,
                        "audit write failed; compliance trail has a gap"
                    );
                    None
                }
            },
        }
    }

    /// Filtered search, newest first
    pub async fn search(&self, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        self.store.search(query).await
    }

    /// Everything one actor did
    pub async fn actor_history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AuditResult<Vec<AuditRecord>> {
        self.store
            .search(&AuditQuery::new().actor(user_id).page(limit, offset))
            .await
    }

    /// Everything that happened to one resource
    pub async fn resource_history(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: i64,
        offset: i64,
    ) -> AuditResult<Vec<AuditRecord>> {
        self.store
            .search(
                &AuditQuery::new()
                    .resource(resource_type, resource_id)
                    .page(limit, offset),
            )
            .await
    }

    /// What was recorded about one person, for subject-access requests
    pub async fn subject_access(&self, email: &str) -> AuditResult<Vec<AuditRecord>> {
        self.store
            .search(&AuditQuery::new().data_subject(email).include_archived())
            .await
    }

    /// Failure clusters within the rolling window
    pub async fn suspicious_activity(&self) -> AuditResult<Vec<SuspiciousActivity>> {
        let window_start = Utc::now() - Duration::minutes(self.config.suspicious_window_minutes);

        let groups = self
            .store
            .failure_groups(window_start, self.config.suspicious_failure_threshold)
            .await?;
        let locked = self
            .store
            .failed_auth_actors(window_start, self.config.lockout_failure_threshold)
            .await?;

        Ok(groups
            .into_iter()
            .map(|group| {
                let lock_recommended = group
                    .user_id
                    .as_ref()
                    .map(|id| locked.contains(id))
                    .unwrap_or(false);
                SuspiciousActivity {
                    user_id: group.user_id,
                    ip: group.ip,
                    failure_count: group.failures,
                    lock_recommended,
                }
            })
            .collect())
    }

    /// Mark non-archived records older than `older_than_days` as archived.
    /// Already-archived records are never touched again.
    pub async fn archive(&self, older_than_days: i64) -> AuditResult<u64> {
        let cutoff = Utc::now() - Duration::days(older_than_days);
        self.store.archive_older_than(cutoff).await
    }

    /// Hard-expire non-archived records past the long retention horizon
    pub async fn purge_expired(&self) -> AuditResult<u64> {
        let cutoff = Utc::now() - Duration::days(self.config.hard_expiry_days);
        self.store.purge_expired(cutoff).await
    }

    /// Tags are the only content-adjacent field mutable post-write
    pub async fn update_tags(&self, id: Uuid, tags: &[String]) -> AuditResult<()> {
        self.store.update_tags(id, tags).await
    }

    pub async fn get(&self, id: Uuid) -> AuditResult<AuditRecord> {
        self.store.get_by_id(id).await
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &AuditStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        AuditAction, AuditActor, AuditCategory, AuditSeverity, RequestContext,
    };
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_trail() -> AuditTrail {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let trail = AuditTrail::new(pool, AuditConfig::default());
        trail.init().await.unwrap();
        trail
    }

    fn maya() -> AuditActor {
        AuditActor::user("USR_001", "maya@agency.example", "Maya")
    }

    #[tokio::test]
    async fn test_record_and_fetch() {
        let trail = test_trail().await;

        let record = trail
            .record(
                AuditFact::new(AuditAction::LeadStatusChanged, maya())
                    .resource("lead", "abc-123")
                    .changes(
                        serde_json::json!({"status": "new"}),
                        serde_json::json!({"status": "contacted"}),
                        vec!["status".to_string()],
                    ),
            )
            .await
            .unwrap();

        let loaded = trail.get(record.id).await.unwrap();
        assert_eq!(loaded.action, AuditAction::LeadStatusChanged);
        assert_eq!(loaded.category, AuditCategory::DataModification);
        assert_eq!(loaded.severity, AuditSeverity::Medium);
        assert_eq!(loaded.resource_id.as_deref(), Some("abc-123"));
        assert_eq!(loaded.changed_fields, vec!["status"]);
        assert_eq!(loaded.retention_period_days, 365);
    }

    #[tokio::test]
    async fn test_actor_and_resource_history_newest_first() {
        let trail = test_trail().await;

        for i in 0..3 {
            trail
                .record(
                    AuditFact::new(AuditAction::LeadUpdated, maya())
                        .resource("lead", format!("lead-{i}")),
                )
                .await
                .unwrap();
        }
        trail
            .record(AuditFact::new(AuditAction::Login, AuditActor::user(
                "USR_002",
                "jonas@agency.example",
                "Jonas",
            )))
            .await
            .unwrap();

        let history = trail.actor_history("USR_001", 10, 0).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let by_resource = trail.resource_history("lead", "lead-1", 10, 0).await.unwrap();
        assert_eq!(by_resource.len(), 1);
    }

    #[tokio::test]
    async fn test_security_feed_filters() {
        let trail = test_trail().await;

        trail
            .record(AuditFact::new(AuditAction::LeadViewed, maya()).resource("lead", "a"))
            .await
            .unwrap();
        trail
            .record(
                AuditFact::new(AuditAction::LoginFailed, AuditActor::anonymous())
                    .failed("bad password"),
            )
            .await
            .unwrap();
        trail
            .record(AuditFact::new(
                AuditAction::SuspiciousActivityDetected,
                AuditActor::anonymous(),
            ))
            .await
            .unwrap();

        let feed = trail
            .search(&AuditQuery::new().min_severity(AuditSeverity::High))
            .await
            .unwrap();
        assert_eq!(feed.len(), 2);

        let security_only = trail
            .search(&AuditQuery::new().category(AuditCategory::Security))
            .await
            .unwrap();
        assert_eq!(security_only.len(), 1);
        assert_eq!(
            security_only[0].action,
            AuditAction::SuspiciousActivityDetected
        );
    }

    #[tokio::test]
    async fn test_subject_access() {
        let trail = test_trail().await;

        trail
            .record(
                AuditFact::new(AuditAction::LeadCreated, maya())
                    .resource("lead", "a")
                    .data_subject("artist@example.com"),
            )
            .await
            .unwrap();
        trail
            .record(
                AuditFact::new(AuditAction::LeadViewed, maya())
                    .resource("lead", "a")
                    .data_subject("artist@example.com"),
            )
            .await
            .unwrap();
        trail
            .record(AuditFact::new(AuditAction::LeadCreated, maya()).data_subject("other@example.com"))
            .await
            .unwrap();

        let records = trail.subject_access("artist@example.com").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.data_subject.as_deref() == Some("artist@example.com")));
    }

    #[tokio::test]
    async fn test_five_failed_logins_recommend_lock() {
        let trail = test_trail().await;
        let context = RequestContext::new("203.0.113.9");

        for _ in 0..5 {
            trail
                .record(
                    AuditFact::new(AuditAction::LoginFailed, maya())
                        .failed("bad password")
                        .context(context.clone()),
                )
                .await
                .unwrap();
        }

        let suspicious = trail.suspicious_activity().await.unwrap();
        assert_eq!(suspicious.len(), 1);

        let hit = &suspicious[0];
        assert_eq!(hit.user_id.as_deref(), Some("USR_001"));
        assert_eq!(hit.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(hit.failure_count, 5);
        assert!(hit.lock_recommended);
    }

    #[tokio::test]
    async fn test_three_failures_reportable_without_lock() {
        let trail = test_trail().await;
        let context = RequestContext::new("198.51.100.7");

        for _ in 0..3 {
            trail
                .record(
                    AuditFact::new(AuditAction::LeadUpdated, maya())
                        .failed("stale write")
                        .context(context.clone()),
                )
                .await
                .unwrap();
        }

        let suspicious = trail.suspicious_activity().await.unwrap();
        assert_eq!(suspicious.len(), 1);
        assert_eq!(suspicious[0].failure_count, 3);
        // Not authentication failures, so no lock recommendation
        assert!(!suspicious[0].lock_recommended);
    }

    #[tokio::test]
    async fn test_two_failures_not_reportable() {
        let trail = test_trail().await;

        for _ in 0..2 {
            trail
                .record(AuditFact::new(AuditAction::LoginFailed, maya()).failed("bad password"))
                .await
                .unwrap();
        }

        assert!(trail.suspicious_activity().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_only_old_non_archived_records() {
        let trail = test_trail().await;

        // 400-day-old record, written directly with a backdated timestamp
        let mut old = AuditRecord::from_fact(
            AuditFact::new(AuditAction::LeadCreated, maya()).resource("lead", "old"),
            365,
        );
        old.timestamp = Utc::now() - Duration::days(400);
        trail.store().insert(&old).await.unwrap();

        // Fresh record
        let recent = trail
            .record(AuditFact::new(AuditAction::LeadCreated, maya()).resource("lead", "new"))
            .await
            .unwrap();

        let archived = trail.archive(365).await.unwrap();
        assert_eq!(archived, 1);

        let old_loaded = trail.get(old.id).await.unwrap();
        assert!(old_loaded.is_archived);
        assert!(old_loaded.archived_at.is_some());
        // Content untouched
        assert_eq!(old_loaded.action, AuditAction::LeadCreated);
        assert!(old_loaded.success);
        assert_eq!(old_loaded.timestamp, old.timestamp);

        let recent_loaded = trail.get(recent.id).await.unwrap();
        assert!(!recent_loaded.is_archived);

        // Re-running archives nothing further
        assert_eq!(trail.archive(365).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_spares_archived_records() {
        let trail = test_trail().await;

        let mut ancient = AuditRecord::from_fact(
            AuditFact::new(AuditAction::LeadCreated, maya()).resource("lead", "ancient"),
            365,
        );
        ancient.timestamp = Utc::now() - Duration::days(900);
        trail.store().insert(&ancient).await.unwrap();

        let mut ancient_archived = AuditRecord::from_fact(
            AuditFact::new(AuditAction::LeadCreated, maya()).resource("lead", "kept"),
            365,
        );
        ancient_archived.timestamp = Utc::now() - Duration::days(900);
        trail.store().insert(&ancient_archived).await.unwrap();
        trail.archive(800).await.unwrap();

        // Re-insert a fresh non-archived ancient record after the archive run
        let mut doomed = AuditRecord::from_fact(
            AuditFact::new(AuditAction::LeadCreated, maya()).resource("lead", "doomed"),
            365,
        );
        doomed.timestamp = Utc::now() - Duration::days(900);
        trail.store().insert(&doomed).await.unwrap();

        let purged = trail.purge_expired().await.unwrap();
        assert_eq!(purged, 1);

        // Archived records survive the purge
        assert!(trail.get(ancient.id).await.unwrap().is_archived);
        assert!(trail.get(ancient_archived.id).await.unwrap().is_archived);
        assert!(trail.get(doomed.id).await.is_err());
    }

    #[tokio::test]
    async fn test_tags_mutable_post_write() {
        let trail = test_trail().await;

        let record = trail
            .record(AuditFact::new(AuditAction::LeadCreated, maya()).tag("import"))
            .await
            .unwrap();

        trail
            .update_tags(record.id, &["import".to_string(), "reviewed".to_string()])
            .await
            .unwrap();

        let loaded = trail.get(record.id).await.unwrap();
        assert_eq!(loaded.tags, vec!["import", "reviewed"]);
        // Everything else unchanged
        assert_eq!(loaded.action, record.action);
        assert_eq!(loaded.timestamp, record.timestamp);
    }

    #[tokio::test]
    async fn test_record_or_log_swallows_store_failure() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        // No schema created: every insert fails
        let trail = AuditTrail::new(pool, AuditConfig::default());

        let result = trail
            .record_or_log(AuditFact::new(AuditAction::LeadCreated, maya()))
            .await;

        assert!(result.is_none());
    }
}
