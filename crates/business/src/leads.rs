//! Lead lifecycle service
//!
//! Capture, status transitions with their mandatory side effects, field
//! updates, notes, follow-ups, reassignment and archival. Every
//! state-changing or sensitive-read operation appends an audit fact after
//! the business write is durable.

use crate::assignment::AssignmentEngine;
use crate::context::{audit_actor, ServiceContext};
use crate::error::{BusinessError, BusinessResult};
use chrono::{DateTime, Utc};
use leadflow_audit::{AuditAction, AuditFact, RequestContext};
use leadflow_core::{
    Actor, Capability, FollowUp, FollowUpKind, Lead, LeadSource, LeadStatus, LostReason, Note,
    NoteType, Platform, Priority,
};
use leadflow_persistence::{FollowUpRepo, LeadRepo, NoteRepo, UserRepo};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Inbound lead capture payload (web form, webhook, integration)
#[derive(Debug, Clone)]
pub struct CaptureLead {
    pub name: String,
    pub artist_name: Option<String>,
    pub source: LeadSource,
    pub platform: Platform,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget: Option<Decimal>,
    pub monthly_listeners: Option<i64>,
    pub instagram: Option<String>,
    pub tiktok_handle: Option<String>,
    pub website: Option<String>,
    pub label: Option<String>,
    pub priority: Option<Priority>,
}

impl CaptureLead {
    pub fn new(name: impl Into<String>, source: LeadSource, platform: Platform) -> Self {
        Self {
            name: name.into(),
            artist_name: None,
            source,
            platform,
            email: None,
            phone: None,
            budget: None,
            monthly_listeners: None,
            instagram: None,
            tiktok_handle: None,
            website: None,
            label: None,
            priority: None,
        }
    }
}

/// Extra fields a transition may carry
#[derive(Debug, Clone, Default)]
pub struct TransitionOpts {
    /// Required (here or already on the lead) when moving to `won`
    pub deal_value: Option<Decimal>,
    /// Required when moving to `lost`
    pub lost_reason: Option<LostReason>,
    /// Free-text appended to the system note
    pub note: Option<String>,
}

/// Partial field update from UI actions. Absent fields stay untouched;
/// status changes go through `transition` only.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub artist_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget: Option<Decimal>,
    pub deal_value: Option<Decimal>,
    pub commission_rate: Option<Decimal>,
    pub priority: Option<Priority>,
    pub monthly_listeners: Option<i64>,
    pub instagram: Option<String>,
    pub tiktok_handle: Option<String>,
    pub website: Option<String>,
    pub label: Option<String>,
}

/// Lead lifecycle operations
pub struct LeadService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LeadService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Capability precondition; denials are themselves audited
    async fn authorize(
        &self,
        actor: &Actor,
        capability: Capability,
        context: &RequestContext,
    ) -> BusinessResult<()> {
        if let Err(err) = actor.require(capability) {
            self.ctx
                .record_audit(
                    AuditFact::new(AuditAction::AccessDenied, audit_actor(actor))
                        .failed(err.to_string())
                        .context(context.clone()),
                )
                .await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Capture an inbound lead: assign, score, encrypt PII, store, audit.
    /// Returns the created lead with plaintext contact fields.
    pub async fn capture(
        &self,
        actor: &Actor,
        request: CaptureLead,
        context: RequestContext,
    ) -> BusinessResult<Lead> {
        self.authorize(actor, Capability::CreateLeads, &context).await?;

        let assignment = AssignmentEngine::new(self.ctx).assign(request.platform).await?;

        let mut lead = Lead::new(
            request.name,
            request.source,
            request.platform,
            assignment.owner_id.clone(),
            assignment.team,
        );
        lead.artist_name = request.artist_name;
        lead.email = request.email;
        lead.phone = request.phone;
        lead.budget = request.budget;
        lead.monthly_listeners = request.monthly_listeners;
        lead.instagram = request.instagram;
        lead.tiktok_handle = request.tiktok_handle;
        lead.website = request.website;
        lead.label = request.label;
        if let Some(priority) = request.priority {
            lead.priority = priority;
        }
        lead.rescore();

        // A lead is never persisted with plaintext PII; encryption failure
        // aborts the write.
        let stored = self.encrypt_pii(&lead)?;
        LeadRepo::insert(self.ctx.pool(), &stored).await?;
        UserRepo::increment_leads_created(self.ctx.pool(), &assignment.owner_id).await?;

        let mut fact = AuditFact::new(AuditAction::LeadCreated, audit_actor(actor))
            .resource("lead", lead.id.to_string())
            .resource_name(lead.name.clone())
            .context(context)
            .changes(
                serde_json::json!({}),
                serde_json::json!({
                    "source": lead.source.as_str(),
                    "platform": lead.platform.as_str(),
                    "assigned_to": lead.assigned_to.clone(),
                    "team": lead.team.as_str(),
                    "lead_score": lead.lead_score,
                }),
                vec!["status".to_string(), "assigned_to".to_string()],
            );
        if let Some(email) = &lead.email {
            fact = fact.data_subject(email.clone());
        }
        self.ctx.record_audit(fact).await;

        Ok(lead)
    }

    /// Read one lead, decrypting PII at the boundary.
    /// The decrypt is the sensitive part: the read is audited.
    pub async fn get(
        &self,
        actor: &Actor,
        id: Uuid,
        context: RequestContext,
    ) -> BusinessResult<Lead> {
        self.authorize(actor, Capability::ViewLeads, &context).await?;

        let lead = self.decrypt_pii(LeadRepo::get_by_id(self.ctx.pool(), id).await?);

        let mut fact = AuditFact::new(AuditAction::LeadViewed, audit_actor(actor))
            .resource("lead", lead.id.to_string())
            .resource_name(lead.name.clone())
            .context(context);
        if let Some(email) = &lead.email {
            fact = fact.data_subject(email.clone());
        }
        self.ctx.record_audit(fact).await;

        Ok(lead)
    }

    /// Move a lead to a new status, applying the mandatory side effects.
    ///
    /// The store write is conditional on the status this call read; a
    /// concurrent transition surfaces as `ConcurrentUpdate`, never as a
    /// silent lost write.
    pub async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        new_status: LeadStatus,
        opts: TransitionOpts,
        context: RequestContext,
    ) -> BusinessResult<Lead> {
        self.authorize(actor, Capability::EditLeads, &context).await?;

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), id).await?;
        let previous_status = lead.status;

        if let Err(err) = previous_status.ensure_transition_to(new_status) {
            self.record_failed_transition(actor, &lead, new_status, &err.to_string(), &context)
                .await;
            return Err(err.into());
        }

        let mut changed_fields = vec!["status".to_string(), "last_activity_date".to_string()];
        let now = Utc::now();

        match new_status {
            LeadStatus::Won => {
                let deal_value = opts.deal_value.or(lead.deal_value);
                let Some(deal_value) = deal_value.filter(|d| *d > Decimal::ZERO) else {
                    let message = "transition to won requires a positive deal value";
                    self.record_failed_transition(actor, &lead, new_status, message, &context)
                        .await;
                    return Err(BusinessError::validation(message));
                };
                lead.deal_value = Some(deal_value);
                lead.won_date = Some(now);
                if let Some(rate) = lead.commission_rate {
                    lead.commission = Some(deal_value * rate / Decimal::from(100));
                    changed_fields.push("commission".to_string());
                }
                changed_fields.extend(["deal_value".to_string(), "won_date".to_string()]);
            }
            LeadStatus::Lost => {
                let Some(reason) = opts.lost_reason.or(lead.lost_reason) else {
                    let message = "transition to lost requires a lost reason";
                    self.record_failed_transition(actor, &lead, new_status, message, &context)
                        .await;
                    return Err(BusinessError::validation(message));
                };
                lead.lost_reason = Some(reason);
                lead.lost_date = Some(now);
                changed_fields.extend(["lost_reason".to_string(), "lost_date".to_string()]);
            }
            LeadStatus::Contacted => {
                if lead.first_contact_date.is_none() {
                    lead.first_contact_date = Some(now);
                    changed_fields.push("first_contact_date".to_string());
                }
                lead.last_contact_date = Some(now);
                changed_fields.push("last_contact_date".to_string());
            }
            _ => {}
        }

        lead.status = new_status;
        lead.last_activity_date = Some(now);
        lead.updated_at = now;
        lead.rescore();

        let written = LeadRepo::update_guarded(self.ctx.pool(), &lead, previous_status).await?;
        if written == 0 {
            return Err(BusinessError::ConcurrentUpdate(id));
        }

        let mut content = format!("Status changed from {} to {}", previous_status, new_status);
        if let Some(note) = &opts.note {
            content.push_str(&format!(" ({note})"));
        }
        NoteRepo::insert(self.ctx.pool(), &Note::system(lead.id, content)).await?;

        if new_status == LeadStatus::Won {
            if let Some(deal_value) = lead.deal_value {
                UserRepo::record_conversion(self.ctx.pool(), &lead.assigned_to, deal_value)
                    .await?;
            }
        }

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::LeadStatusChanged, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .resource_name(lead.name.clone())
                    .context(context)
                    .changes(
                        serde_json::json!({"status": previous_status.as_str()}),
                        serde_json::json!({"status": new_status.as_str()}),
                        changed_fields,
                    ),
            )
            .await;

        Ok(self.decrypt_pii(lead))
    }

    /// Apply a partial field update; the score is recomputed afterwards
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: LeadPatch,
        context: RequestContext,
    ) -> BusinessResult<Lead> {
        self.authorize(actor, Capability::EditLeads, &context).await?;

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), id).await?;
        let previous_score = lead.lead_score;
        let mut changed_fields = Vec::new();

        macro_rules! apply {
            ($field:ident) => {
                if let Some(value) = patch.$field {
                    lead.$field = Some(value);
                    changed_fields.push(stringify!($field).to_string());
                }
            };
        }

        apply!(artist_name);
        apply!(budget);
        apply!(deal_value);
        apply!(commission_rate);
        apply!(monthly_listeners);
        apply!(instagram);
        apply!(tiktok_handle);
        apply!(website);
        apply!(label);
        if let Some(priority) = patch.priority {
            lead.priority = priority;
            changed_fields.push("priority".to_string());
        }
        if let Some(email) = patch.email {
            lead.email = Some(self.ctx.cipher().encrypt(&email)?);
            changed_fields.push("email".to_string());
        }
        if let Some(phone) = patch.phone {
            lead.phone = Some(self.ctx.cipher().encrypt(&phone)?);
            changed_fields.push("phone".to_string());
        }

        if changed_fields.is_empty() {
            return Ok(self.decrypt_pii(lead));
        }

        lead.last_activity_date = Some(Utc::now());
        lead.updated_at = Utc::now();
        lead.rescore();

        let status = lead.status;
        let written = LeadRepo::update_guarded(self.ctx.pool(), &lead, status).await?;
        if written == 0 {
            return Err(BusinessError::ConcurrentUpdate(id));
        }

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::LeadUpdated, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .resource_name(lead.name.clone())
                    .context(context)
                    .changes(
                        serde_json::json!({"lead_score": previous_score}),
                        serde_json::json!({"lead_score": lead.lead_score}),
                        changed_fields,
                    ),
            )
            .await;

        Ok(self.decrypt_pii(lead))
    }

    /// Attach a note; bumps activity without touching status
    pub async fn add_note(
        &self,
        actor: &Actor,
        id: Uuid,
        content: impl Into<String>,
        note_type: NoteType,
        is_private: bool,
        context: RequestContext,
    ) -> BusinessResult<Note> {
        self.authorize(actor, Capability::EditLeads, &context).await?;

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), id).await?;

        let mut note = Note::new(lead.id, actor.user_id.clone(), content, note_type);
        if is_private {
            note = note.private();
        }
        NoteRepo::insert(self.ctx.pool(), &note).await?;

        lead.last_activity_date = Some(Utc::now());
        lead.updated_at = Utc::now();
        let status = lead.status;
        LeadRepo::update_guarded(self.ctx.pool(), &lead, status).await?;

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::NoteAdded, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .context(context),
            )
            .await;

        Ok(note)
    }

    /// Schedule a follow-up; sets the lead's next follow-up pointer
    pub async fn schedule_follow_up(
        &self,
        actor: &Actor,
        id: Uuid,
        due_at: DateTime<Utc>,
        kind: FollowUpKind,
        context: RequestContext,
    ) -> BusinessResult<FollowUp> {
        self.authorize(actor, Capability::EditLeads, &context).await?;

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), id).await?;

        let follow_up = FollowUp::new(lead.id, actor.user_id.clone(), due_at, kind);
        FollowUpRepo::insert(self.ctx.pool(), &follow_up).await?;

        lead.next_follow_up = Some(due_at);
        lead.follow_up_count += 1;
        lead.last_activity_date = Some(Utc::now());
        lead.updated_at = Utc::now();
        let status = lead.status;
        LeadRepo::update_guarded(self.ctx.pool(), &lead, status).await?;

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::FollowUpScheduled, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .context(context),
            )
            .await;

        Ok(follow_up)
    }

    pub async fn complete_follow_up(
        &self,
        actor: &Actor,
        follow_up_id: Uuid,
        context: RequestContext,
    ) -> BusinessResult<()> {
        self.authorize(actor, Capability::EditLeads, &context).await?;

        let follow_up = FollowUpRepo::get_by_id(self.ctx.pool(), follow_up_id).await?;
        FollowUpRepo::mark_completed(self.ctx.pool(), follow_up_id).await?;

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), follow_up.lead_id).await?;
        lead.last_activity_date = Some(Utc::now());
        lead.updated_at = Utc::now();
        let status = lead.status;
        LeadRepo::update_guarded(self.ctx.pool(), &lead, status).await?;

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::FollowUpCompleted, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .context(context),
            )
            .await;

        Ok(())
    }

    /// Explicit reassignment - the only way owner/team change after capture
    pub async fn reassign(
        &self,
        actor: &Actor,
        id: Uuid,
        new_owner: &str,
        context: RequestContext,
    ) -> BusinessResult<Lead> {
        self.authorize(actor, Capability::ReassignLeads, &context).await?;

        let owner = UserRepo::get_by_id(self.ctx.pool(), new_owner).await?;
        if !owner.is_active {
            return Err(BusinessError::validation(format!(
                "cannot reassign to inactive user {new_owner}"
            )));
        }

        let mut lead = LeadRepo::get_by_id(self.ctx.pool(), id).await?;
        let previous_owner = lead.assigned_to.clone();
        let previous_team = lead.team;

        lead.assigned_to = owner.id.clone();
        lead.team = owner.team;
        lead.last_activity_date = Some(Utc::now());
        lead.updated_at = Utc::now();
        let status = lead.status;
        let written = LeadRepo::update_guarded(self.ctx.pool(), &lead, status).await?;
        if written == 0 {
            return Err(BusinessError::ConcurrentUpdate(id));
        }

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::LeadReassigned, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .context(context)
                    .changes(
                        serde_json::json!({
                            "assigned_to": previous_owner,
                            "team": previous_team.as_str(),
                        }),
                        serde_json::json!({
                            "assigned_to": lead.assigned_to.clone(),
                            "team": lead.team.as_str(),
                        }),
                        vec!["assigned_to".to_string(), "team".to_string()],
                    ),
            )
            .await;

        Ok(self.decrypt_pii(lead))
    }

    /// Remove a lead from the active pipeline
    pub async fn archive(
        &self,
        actor: &Actor,
        id: Uuid,
        context: RequestContext,
    ) -> BusinessResult<()> {
        self.authorize(actor, Capability::ArchiveLeads, &context).await?;

        LeadRepo::archive(self.ctx.pool(), id).await?;

        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::LeadArchived, audit_actor(actor))
                    .resource("lead", id.to_string())
                    .context(context),
            )
            .await;

        Ok(())
    }

    pub async fn notes(&self, actor: &Actor, id: Uuid) -> BusinessResult<Vec<Note>> {
        actor.require(Capability::ViewLeads)?;
        Ok(NoteRepo::for_lead(self.ctx.pool(), id).await?)
    }

    pub async fn follow_ups(&self, actor: &Actor, id: Uuid) -> BusinessResult<Vec<FollowUp>> {
        actor.require(Capability::ViewLeads)?;
        Ok(FollowUpRepo::for_lead(self.ctx.pool(), id).await?)
    }

    /// Active-pipeline counts per status
    pub async fn pipeline_counts(&self, actor: &Actor) -> BusinessResult<Vec<(String, i64)>> {
        actor.require(Capability::ViewLeads)?;
        Ok(LeadRepo::status_counts(self.ctx.pool()).await?)
    }

    async fn record_failed_transition(
        &self,
        actor: &Actor,
        lead: &Lead,
        attempted: LeadStatus,
        message: &str,
        context: &RequestContext,
    ) {
        self.ctx
            .record_audit(
                AuditFact::new(AuditAction::LeadStatusChanged, audit_actor(actor))
                    .resource("lead", lead.id.to_string())
                    .resource_name(lead.name.clone())
                    .failed(message)
                    .context(context.clone())
                    .tag(format!("attempted:{attempted}")),
            )
            .await;
    }

    fn encrypt_pii(&self, lead: &Lead) -> BusinessResult<Lead> {
        let mut stored = lead.clone();
        if let Some(email) = &lead.email {
            stored.email = Some(self.ctx.cipher().encrypt(email)?);
        }
        if let Some(phone) = &lead.phone {
            stored.phone = Some(self.ctx.cipher().encrypt(phone)?);
        }
        Ok(stored)
    }

    fn decrypt_pii(&self, mut lead: Lead) -> Lead {
        if let Some(email) = lead.email.take() {
            lead.email = Some(self.ctx.decrypt_or_raw(&email));
        }
        if let Some(phone) = lead.phone.take() {
            lead.phone = Some(self.ctx.decrypt_or_raw(&phone));
        }
        lead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentConfig;
    use leadflow_audit::{AuditConfig, AuditRecord};
    use leadflow_core::{Role, Team, User};
    use leadflow_crypto::FieldCipher;
    use leadflow_persistence::create_pool;
    use rust_decimal_macros::dec;

    const TEST_KEY: &str = "unit-test-key-material-0123456789abcdef";

    async fn test_ctx() -> ServiceContext {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let ctx = ServiceContext::new(
            pool,
            FieldCipher::new(TEST_KEY).unwrap(),
            AuditConfig::default(),
            AssignmentConfig::default(),
        );
        ctx.init().await.unwrap();

        for (id, name, team, role) in [
            ("USR_ANA", "Ana", Team::Streaming, Role::Member),
            ("USR_BEN", "Ben", Team::Streaming, Role::Member),
            ("USR_CARO", "Caro", Team::Social, Role::Manager),
        ] {
            let user = User::new(id, name, format!("{}@agency.example", name.to_lowercase()), team, role);
            UserRepo::insert(ctx.pool(), &user).await.unwrap();
        }
        ctx
    }

    fn actor(ctx_user: (&str, &str, Team, Role)) -> Actor {
        Actor {
            user_id: ctx_user.0.to_string(),
            email: format!("{}@agency.example", ctx_user.1.to_lowercase()),
            name: ctx_user.1.to_string(),
            team: ctx_user.2,
            role: ctx_user.3,
        }
    }

    fn ana() -> Actor {
        actor(("USR_ANA", "Ana", Team::Streaming, Role::Member))
    }

    fn caro() -> Actor {
        actor(("USR_CARO", "Caro", Team::Social, Role::Manager))
    }

    fn rich_capture() -> CaptureLead {
        let mut request = CaptureLead::new("Nova Waves", LeadSource::Referral, Platform::Youtube);
        request.email = Some("nova@artist.example".to_string());
        request.phone = Some("+49 170 1234567".to_string());
        request.budget = Some(dec!(12000));
        request.monthly_listeners = Some(150_000);
        request
    }

    async fn lead_status_records(ctx: &ServiceContext, lead_id: Uuid) -> Vec<AuditRecord> {
        ctx.audit()
            .resource_history("lead", &lead_id.to_string(), 100, 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_capture_assigns_scores_and_encrypts() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        // Routed by platform, least-loaded member picked
        assert_eq!(lead.team, Team::Streaming);
        assert_eq!(lead.assigned_to, "USR_ANA");
        // budget 30 + audience 25 + referral 15
        assert_eq!(lead.lead_score, 70);
        assert_eq!(lead.quality, leadflow_core::LeadQuality::Hot);
        // Caller sees plaintext
        assert_eq!(lead.email.as_deref(), Some("nova@artist.example"));

        // At rest the PII is an envelope, not plaintext
        let stored_email: Option<String> =
            sqlx::query_scalar("SELECT email FROM leads WHERE id = ?")
                .bind(lead.id.to_string())
                .fetch_one(ctx.pool())
                .await
                .unwrap();
        let stored_email = stored_email.unwrap();
        assert_ne!(stored_email, "nova@artist.example");
        assert!(stored_email.contains(':'));

        // Owner workload counter bumped
        let owner = UserRepo::get_by_id(ctx.pool(), "USR_ANA").await.unwrap();
        assert_eq!(owner.leads_created, 1);

        // Creation audited with the lead as subject
        let records = lead_status_records(&ctx, lead.id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::LeadCreated);
        assert_eq!(records[0].data_subject.as_deref(), Some("nova@artist.example"));
    }

    #[tokio::test]
    async fn test_second_capture_balances_within_team() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let first = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();
        let second = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        assert_eq!(first.assigned_to, "USR_ANA");
        assert_eq!(second.assigned_to, "USR_BEN");
    }

    #[tokio::test]
    async fn test_transition_to_contacted_side_effects() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        let updated = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Contacted,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, LeadStatus::Contacted);
        assert!(updated.first_contact_date.is_some());
        assert!(updated.last_contact_date.is_some());
        assert!(updated.last_activity_date.is_some());
        // Fast first contact adds the responsiveness band
        assert_eq!(updated.lead_score, 80);

        // System note written
        let notes = service.notes(&ana(), lead.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].author, "system");
        assert!(notes[0].content.contains("new"));
        assert!(notes[0].content.contains("contacted"));

        // Exactly one successful status-change record
        let records = lead_status_records(&ctx, lead.id).await;
        let status_changes: Vec<_> = records
            .iter()
            .filter(|r| r.action == AuditAction::LeadStatusChanged && r.success)
            .collect();
        assert_eq!(status_changes.len(), 1);
        assert_eq!(
            status_changes[0].resource_id.as_deref(),
            Some(lead.id.to_string().as_str())
        );
        assert_eq!(
            status_changes[0].category,
            leadflow_audit::AuditCategory::DataModification
        );
    }

    #[tokio::test]
    async fn test_won_without_deal_value_rejected() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();
        service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Contacted,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap();

        let err = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Won,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // Lead unchanged
        let reloaded = LeadRepo::get_by_id(ctx.pool(), lead.id).await.unwrap();
        assert_eq!(reloaded.status, LeadStatus::Contacted);
        assert!(reloaded.won_date.is_none());

        // No successful record of the attempted change; the failure itself
        // is on the trail
        let records = lead_status_records(&ctx, lead.id).await;
        let won_successes = records
            .iter()
            .filter(|r| r.action == AuditAction::LeadStatusChanged && r.success)
            .filter(|r| {
                r.new_data
                    .as_ref()
                    .map(|d| d["status"] == "won")
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(won_successes, 0);
        assert!(records.iter().any(|r| !r.success));
    }

    #[tokio::test]
    async fn test_won_happy_path() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();
        service
            .update(
                &ana(),
                lead.id,
                LeadPatch {
                    commission_rate: Some(dec!(15)),
                    ..LeadPatch::default()
                },
                RequestContext::default(),
            )
            .await
            .unwrap();
        service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Negotiation,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap();

        let won = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Won,
                TransitionOpts {
                    deal_value: Some(dec!(5000)),
                    ..TransitionOpts::default()
                },
                RequestContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(won.status, LeadStatus::Won);
        assert_eq!(won.deal_value, Some(dec!(5000)));
        assert!(won.won_date.is_some());
        assert_eq!(won.commission, Some(dec!(750)));

        // Owner conversion counters
        let owner = UserRepo::get_by_id(ctx.pool(), "USR_ANA").await.unwrap();
        assert_eq!(owner.leads_converted, 1);
        assert_eq!(owner.total_revenue, dec!(5000));

        // Terminal: nothing further allowed
        let err = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Contacted,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BusinessError::Core(leadflow_core::CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_lost_requires_reason() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        let err = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Lost,
                TransitionOpts::default(),
                RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let lost = service
            .transition(
                &ana(),
                lead.id,
                LeadStatus::Lost,
                TransitionOpts {
                    lost_reason: Some(LostReason::NoResponse),
                    ..TransitionOpts::default()
                },
                RequestContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(lost.lost_reason, Some(LostReason::NoResponse));
        assert!(lost.lost_date.is_some());
    }

    #[tokio::test]
    async fn test_member_cannot_reassign_and_denial_is_audited() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        let err = service
            .reassign(&ana(), lead.id, "USR_BEN", RequestContext::default())
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let denials = ctx
            .audit()
            .actor_history("USR_ANA", 100, 0)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.action == AuditAction::AccessDenied)
            .count();
        assert_eq!(denials, 1);
    }

    #[tokio::test]
    async fn test_manager_reassign_moves_owner_and_team() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        let reassigned = service
            .reassign(&caro(), lead.id, "USR_CARO", RequestContext::default())
            .await
            .unwrap();

        assert_eq!(reassigned.assigned_to, "USR_CARO");
        assert_eq!(reassigned.team, Team::Social);

        let records = lead_status_records(&ctx, lead.id).await;
        assert!(records.iter().any(|r| r.action == AuditAction::LeadReassigned));
    }

    #[tokio::test]
    async fn test_notes_and_follow_ups_bump_activity_only() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();

        service
            .add_note(
                &ana(),
                lead.id,
                "Spoke on the phone, very interested",
                NoteType::Call,
                false,
                RequestContext::default(),
            )
            .await
            .unwrap();

        let due = Utc::now() + chrono::Duration::days(3);
        let follow_up = service
            .schedule_follow_up(&ana(), lead.id, due, FollowUpKind::Call, RequestContext::default())
            .await
            .unwrap();

        let reloaded = LeadRepo::get_by_id(ctx.pool(), lead.id).await.unwrap();
        assert_eq!(reloaded.status, LeadStatus::New);
        assert!(reloaded.last_activity_date.is_some());
        assert_eq!(reloaded.follow_up_count, 1);
        assert_eq!(reloaded.next_follow_up, Some(due));

        service
            .complete_follow_up(&ana(), follow_up.id, RequestContext::default())
            .await
            .unwrap();
        let follow_ups = service.follow_ups(&ana(), lead.id).await.unwrap();
        assert!(follow_ups[0].completed);
    }

    #[tokio::test]
    async fn test_get_audits_read_and_degrades_on_bad_envelope() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        // Stored under a different key: authentication will fail
        let foreign = FieldCipher::new("some-other-key-material-9876543210zyxwv").unwrap();
        let mut lead = Lead::new(
            "Imported",
            LeadSource::Manual,
            Platform::Spotify,
            "USR_ANA",
            Team::Streaming,
        );
        lead.email = Some(foreign.encrypt("imported@artist.example").unwrap());
        LeadRepo::insert(ctx.pool(), &lead).await.unwrap();

        let fetched = service
            .get(&ana(), lead.id, RequestContext::default())
            .await
            .unwrap();

        // Read degrades to the raw stored value instead of failing
        assert_eq!(fetched.email, lead.email);

        let records = lead_status_records(&ctx, lead.id).await;
        assert!(records.iter().any(|r| r.action == AuditAction::LeadViewed));
    }

    #[tokio::test]
    async fn test_update_patch_rescores() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let mut request = CaptureLead::new("Slow Burn", LeadSource::Manual, Platform::Spotify);
        request.budget = Some(dec!(500));
        let lead = service
            .capture(&ana(), request, RequestContext::default())
            .await
            .unwrap();
        // budget 5 + manual source 3
        assert_eq!(lead.lead_score, 8);

        let updated = service
            .update(
                &ana(),
                lead.id,
                LeadPatch {
                    budget: Some(dec!(11000)),
                    monthly_listeners: Some(200_000),
                    ..LeadPatch::default()
                },
                RequestContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(updated.lead_score, 58);

        let records = lead_status_records(&ctx, lead.id).await;
        let update_record = records
            .iter()
            .find(|r| r.action == AuditAction::LeadUpdated)
            .unwrap();
        assert!(update_record.changed_fields.contains(&"budget".to_string()));
        assert!(update_record
            .changed_fields
            .contains(&"monthly_listeners".to_string()));
    }

    #[tokio::test]
    async fn test_archived_lead_leaves_pipeline() {
        let ctx = test_ctx().await;
        let service = LeadService::new(&ctx);

        let lead = service
            .capture(&ana(), rich_capture(), RequestContext::default())
            .await
            .unwrap();
        service
            .archive(&caro(), lead.id, RequestContext::default())
            .await
            .unwrap();

        assert_eq!(
            LeadRepo::open_count_by_owner(ctx.pool(), "USR_ANA").await.unwrap(),
            0
        );

        let records = lead_status_records(&ctx, lead.id).await;
        assert!(records.iter().any(|r| r.action == AuditAction::LeadArchived));
    }
}
