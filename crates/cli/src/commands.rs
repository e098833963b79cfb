//! Command handlers

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use leadflow_audit::{
    AuditAction, AuditActor, AuditFact, AuditQuery, AuditRecord, AuditSeverity,
};
use leadflow_business::{CaptureLead, LeadService, ServiceContext, TransitionOpts};
use leadflow_core::{
    Actor, FollowUpKind, LeadSource, LeadStatus, LostReason, NoteType, Platform, Role, Team, User,
};
use leadflow_persistence::UserRepo;
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct CaptureArgs {
    pub name: String,
    pub platform: String,
    pub source: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub budget: Option<Decimal>,
    pub listeners: Option<i64>,
    pub instagram: Option<String>,
    pub website: Option<String>,
    pub label: Option<String>,
}

async fn load_actor(ctx: &ServiceContext, user_id: &str) -> Result<Actor> {
    let user = UserRepo::get_by_id(ctx.pool(), user_id)
        .await
        .with_context(|| format!("unknown acting user {user_id}"))?;
    Ok(user.actor())
}

fn parse_lead_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow!("invalid lead id: {s}"))
}

pub async fn init(ctx: &ServiceContext) -> Result<()> {
    ctx.init().await?;
    ctx.audit()
        .record_or_log(AuditFact::new(
            AuditAction::SchemaMigrated,
            AuditActor::anonymous(),
        ))
        .await;

    println!("✅ Database initialized");
    Ok(())
}

pub async fn user_add(
    ctx: &ServiceContext,
    id: &str,
    name: &str,
    email: &str,
    team: &str,
    role: &str,
) -> Result<()> {
    let team = Team::from_str(team).ok_or_else(|| anyhow!("unknown team: {team}"))?;
    let role = Role::from_str(role).ok_or_else(|| anyhow!("unknown role: {role}"))?;

    let user = User::new(id, name, email, team, role);
    UserRepo::insert(ctx.pool(), &user).await?;

    ctx.audit()
        .record_or_log(
            AuditFact::new(AuditAction::UserCreated, AuditActor::anonymous())
                .resource("user", id)
                .resource_name(name)
                .data_subject(email),
        )
        .await;

    println!("✅ Added {user}");
    Ok(())
}

pub async fn users(ctx: &ServiceContext) -> Result<()> {
    let users = UserRepo::all(ctx.pool()).await?;
    if users.is_empty() {
        println!("No users yet. Run 'leadflow user-add' first.");
        return Ok(());
    }

    println!("👥 Team members");
    for user in users {
        println!(
            "   {:10} {:20} team: {:9} role: {:7} active: {:5} created: {:3} converted: {:3} revenue: {}",
            user.id,
            user.name,
            user.team.to_string(),
            user.role.to_string(),
            user.is_active,
            user.leads_created,
            user.leads_converted,
            user.total_revenue,
        );
    }
    Ok(())
}

pub async fn capture(ctx: &ServiceContext, actor_id: &str, args: CaptureArgs) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let platform = Platform::from_str(&args.platform)
        .ok_or_else(|| anyhow!("unknown platform: {}", args.platform))?;
    let source = LeadSource::from_str(&args.source)
        .ok_or_else(|| anyhow!("unknown source: {}", args.source))?;

    let mut request = CaptureLead::new(args.name, source, platform);
    request.email = args.email;
    request.phone = args.phone;
    request.budget = args.budget;
    request.monthly_listeners = args.listeners;
    request.instagram = args.instagram;
    request.website = args.website;
    request.label = args.label;

    let lead = LeadService::new(ctx)
        .capture(&actor, request, Default::default())
        .await?;

    println!("🎯 Captured lead {}", lead.id);
    println!("   {} ({} via {})", lead.name, lead.platform, lead.source);
    println!("   Owner: {} (team {})", lead.assigned_to, lead.team);
    println!("   Score: {} ({})", lead.lead_score, lead.quality);
    Ok(())
}

pub async fn transition(
    ctx: &ServiceContext,
    actor_id: &str,
    lead: &str,
    status: &str,
    deal_value: Option<Decimal>,
    lost_reason: Option<String>,
    note: Option<String>,
) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let id = parse_lead_id(lead)?;
    let status =
        LeadStatus::from_str(status).ok_or_else(|| anyhow!("unknown status: {status}"))?;
    let lost_reason = lost_reason
        .map(|r| LostReason::from_str(&r).ok_or_else(|| anyhow!("unknown lost reason: {r}")))
        .transpose()?;

    let lead = LeadService::new(ctx)
        .transition(
            &actor,
            id,
            status,
            TransitionOpts {
                deal_value,
                lost_reason,
                note,
            },
            Default::default(),
        )
        .await?;

    println!("✅ {} is now {}", lead.id, lead.status);
    if let Some(deal_value) = lead.deal_value {
        println!("   Deal value: {deal_value}");
    }
    if let Some(reason) = lead.lost_reason {
        println!("   Lost reason: {reason}");
    }
    Ok(())
}

pub async fn add_note(
    ctx: &ServiceContext,
    actor_id: &str,
    lead: &str,
    content: &str,
    note_type: &str,
    private: bool,
) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let id = parse_lead_id(lead)?;
    let note_type =
        NoteType::from_str(note_type).ok_or_else(|| anyhow!("unknown note type: {note_type}"))?;

    let note = LeadService::new(ctx)
        .add_note(&actor, id, content, note_type, private, Default::default())
        .await?;

    println!("📝 Added {} note {}", note.note_type, note.id);
    Ok(())
}

pub async fn follow_up(
    ctx: &ServiceContext,
    actor_id: &str,
    lead: &str,
    due: &str,
    kind: &str,
) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let id = parse_lead_id(lead)?;
    let due: DateTime<Utc> = DateTime::parse_from_rfc3339(due)
        .with_context(|| format!("invalid due time: {due}"))?
        .with_timezone(&Utc);
    let kind = FollowUpKind::from_str(kind)
        .ok_or_else(|| anyhow!("unknown follow-up kind: {kind}"))?;

    let follow_up = LeadService::new(ctx)
        .schedule_follow_up(&actor, id, due, kind, Default::default())
        .await?;

    println!("⏰ Scheduled {} follow-up {} for {}", follow_up.kind, follow_up.id, follow_up.due_at);
    Ok(())
}

pub async fn reassign(
    ctx: &ServiceContext,
    actor_id: &str,
    lead: &str,
    owner: &str,
) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let id = parse_lead_id(lead)?;

    let lead = LeadService::new(ctx)
        .reassign(&actor, id, owner, Default::default())
        .await?;

    println!("✅ {} now owned by {} (team {})", lead.id, lead.assigned_to, lead.team);
    Ok(())
}

pub async fn show(ctx: &ServiceContext, actor_id: &str, lead: &str) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let id = parse_lead_id(lead)?;
    let service = LeadService::new(ctx);

    let lead = service.get(&actor, id, Default::default()).await?;

    println!("🎯 {lead}");
    println!("   Priority: {} | Quality: {}", lead.priority, lead.quality);
    if let Some(email) = &lead.email {
        println!("   Email: {email}");
    }
    if let Some(phone) = &lead.phone {
        println!("   Phone: {phone}");
    }
    if let Some(budget) = lead.budget {
        println!("   Budget: {budget}");
    }
    if let Some(listeners) = lead.monthly_listeners {
        println!("   Monthly listeners: {listeners}");
    }
    if let Some(next) = lead.next_follow_up {
        println!("   Next follow-up: {next}");
    }

    let notes = service.notes(&actor, id).await?;
    if !notes.is_empty() {
        println!("   Notes:");
        for note in notes {
            println!("     [{}] {} ({})", note.created_at, note.content, note.author);
        }
    }

    let follow_ups = service.follow_ups(&actor, id).await?;
    if !follow_ups.is_empty() {
        println!("   Follow-ups:");
        for follow_up in follow_ups {
            let state = if follow_up.completed { "done" } else { "open" };
            println!("     [{}] {} ({})", follow_up.due_at, follow_up.kind, state);
        }
    }
    Ok(())
}

pub async fn pipeline(ctx: &ServiceContext, actor_id: &str) -> Result<()> {
    let actor = load_actor(ctx, actor_id).await?;
    let counts = LeadService::new(ctx).pipeline_counts(&actor).await?;

    if counts.is_empty() {
        println!("Pipeline is empty.");
        return Ok(());
    }

    println!("📊 Active pipeline");
    for (status, count) in counts {
        println!("   {:13} {count}", status);
    }
    Ok(())
}

fn print_records(records: &[AuditRecord]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }
    for record in records {
        let actor = record.user_id.as_deref().unwrap_or("anonymous");
        let resource = match (&record.resource_type, &record.resource_id) {
            (Some(t), Some(id)) => format!("{t}:{id}"),
            _ => "-".to_string(),
        };
        let outcome = if record.success { "ok" } else { "FAILED" };
        println!(
            "   {} {:8} {:17} {:28} {:12} {:40} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.severity.to_string(),
            record.category.to_string(),
            record.action.to_string(),
            actor,
            resource,
            outcome,
        );
    }
}

pub async fn audit_recent(ctx: &ServiceContext, limit: i64) -> Result<()> {
    let records = ctx.audit().search(&AuditQuery::new().page(limit, 0)).await?;
    println!("🔍 Latest audit records");
    print_records(&records);
    Ok(())
}

pub async fn audit_security(ctx: &ServiceContext, limit: i64) -> Result<()> {
    let records = ctx
        .audit()
        .search(
            &AuditQuery::new()
                .min_severity(AuditSeverity::High)
                .page(limit, 0),
        )
        .await?;
    println!("🚨 Security feed (high severity and above)");
    print_records(&records);
    Ok(())
}

pub async fn audit_actor_history(ctx: &ServiceContext, id: &str, limit: i64) -> Result<()> {
    let records = ctx.audit().actor_history(id, limit, 0).await?;
    println!("🔍 Audit history for {id}");
    print_records(&records);
    Ok(())
}

pub async fn audit_resource(
    ctx: &ServiceContext,
    resource_type: &str,
    id: &str,
    limit: i64,
) -> Result<()> {
    let records = ctx.audit().resource_history(resource_type, id, limit, 0).await?;
    println!("🔍 Audit history for {resource_type}:{id}");
    print_records(&records);
    Ok(())
}

pub async fn audit_subject(ctx: &ServiceContext, email: &str) -> Result<()> {
    let records = ctx.audit().subject_access(email).await?;
    println!("🔍 Records concerning {email} (subject-access request)");
    print_records(&records);
    ctx.audit()
        .record_or_log(
            AuditFact::new(AuditAction::DataExported, AuditActor::anonymous())
                .data_subject(email)
                .tag("subject_access"),
        )
        .await;
    Ok(())
}

pub async fn audit_suspicious(ctx: &ServiceContext) -> Result<()> {
    let hits = ctx.audit().suspicious_activity().await?;
    if hits.is_empty() {
        println!("No suspicious activity in the current window.");
        return Ok(());
    }

    println!("🚨 Suspicious activity");
    for hit in &hits {
        let actor = hit.user_id.as_deref().unwrap_or("anonymous");
        let ip = hit.ip.as_deref().unwrap_or("-");
        let lock = if hit.lock_recommended {
            " → account lock recommended"
        } else {
            ""
        };
        println!("   {actor} @ {ip}: {} failures{lock}", hit.failure_count);

        ctx.audit()
            .record_or_log(
                AuditFact::new(
                    AuditAction::SuspiciousActivityDetected,
                    AuditActor::anonymous(),
                )
                .resource("user", actor)
                .tag(format!("failures:{}", hit.failure_count)),
            )
            .await;
    }
    Ok(())
}

pub async fn audit_archive(ctx: &ServiceContext, days: i64) -> Result<()> {
    let archived = ctx.audit().archive(days).await?;
    ctx.audit()
        .record_or_log(
            AuditFact::new(AuditAction::RetentionRun, AuditActor::anonymous())
                .tag(format!("archived:{archived}")),
        )
        .await;

    println!("📦 Archived {archived} records older than {days} days");
    Ok(())
}

pub async fn audit_purge(ctx: &ServiceContext) -> Result<()> {
    let purged = ctx.audit().purge_expired().await?;
    ctx.audit()
        .record_or_log(
            AuditFact::new(AuditAction::RetentionRun, AuditActor::anonymous())
                .tag(format!("purged:{purged}")),
        )
        .await;

    println!("🗑️  Hard-expired {purged} records past the retention horizon");
    Ok(())
}
