//! Leadflow CLI - Main entry point

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadflow_audit::AuditConfig;
use leadflow_business::{AssignmentConfig, ServiceContext};
use leadflow_crypto::FieldCipher;
use leadflow_persistence::create_pool;
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Environment variable holding the PII encryption key
const KEY_ENV: &str = "LEADFLOW_ENCRYPTION_KEY";

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(about = "Leadflow - Sales pipeline CRM core", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(short, long, default_value = "leadflow.db")]
    db: PathBuf,

    /// Owner of last resort when a team has no active member
    #[arg(long)]
    default_owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Add a team member
    UserAdd {
        /// User ID (e.g. USR_001)
        id: String,
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Team: streaming | social
        team: String,
        /// Role: admin | manager | member
        #[arg(long, default_value = "member")]
        role: String,
    },

    /// List team members and their workload counters
    Users,

    /// Capture an inbound lead
    Capture {
        /// Contact name
        name: String,
        /// Platform: youtube | spotify | meta | tiktok | google | multiple
        platform: String,
        /// Source: simulator | contact_form | calendly | manual | referral | social_media
        source: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        budget: Option<Decimal>,
        /// Monthly listeners on the primary streaming profile
        #[arg(long)]
        listeners: Option<i64>,
        #[arg(long)]
        instagram: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },

    /// Move a lead to a new status
    Transition {
        /// Lead ID
        lead: String,
        /// Target status
        status: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
        /// Deal value (required for won)
        #[arg(long)]
        deal_value: Option<Decimal>,
        /// Lost reason (required for lost)
        #[arg(long)]
        lost_reason: Option<String>,
        /// Free-text appended to the system note
        #[arg(long)]
        note: Option<String>,
    },

    /// Attach a note to a lead
    Note {
        /// Lead ID
        lead: String,
        /// Note content
        content: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
        /// Note type: general | call | meeting | email
        #[arg(long, default_value = "general")]
        note_type: String,
        /// Visible to the author's team only
        #[arg(long)]
        private: bool,
    },

    /// Schedule a follow-up on a lead
    FollowUp {
        /// Lead ID
        lead: String,
        /// Due time, RFC 3339 (e.g. 2026-09-01T10:00:00Z)
        due: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
        /// Kind: call | email | meeting | other
        #[arg(long, default_value = "call")]
        kind: String,
    },

    /// Reassign a lead to another owner
    Reassign {
        /// Lead ID
        lead: String,
        /// New owner user ID
        owner: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
    },

    /// Show one lead with notes and follow-ups
    Show {
        /// Lead ID
        lead: String,
        /// Acting user ID
        #[arg(long)]
        actor: String,
    },

    /// Active-pipeline counts per status
    Pipeline {
        /// Acting user ID
        #[arg(long)]
        actor: String,
    },

    /// Audit trail queries and retention
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Latest records
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// High-severity security feed
    Security {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Everything one actor did
    Actor {
        /// User ID
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Everything recorded about one resource
    Resource {
        /// Resource type (e.g. lead)
        resource_type: String,
        /// Resource ID
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Subject-access request: all records about one person
    Subject {
        /// Data subject email
        email: String,
    },

    /// Failure clusters within the rolling window
    Suspicious,

    /// Mark records older than the given age as archived
    Archive {
        /// Age threshold in days
        #[arg(default_value_t = 365)]
        days: i64,
    },

    /// Hard-expire non-archived records past the retention horizon
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Key absence is fatal before any command runs
    let key = std::env::var(KEY_ENV)
        .with_context(|| format!("{KEY_ENV} must be set to the PII encryption key"))?;
    let cipher = FieldCipher::new(&key).context("invalid encryption key")?;

    let db_url = format!("sqlite:{}?mode=rwc", cli.db.display());
    let pool = create_pool(&db_url).await.context("Failed to open database")?;
    let ctx = ServiceContext::new(
        pool,
        cipher,
        AuditConfig::default(),
        AssignmentConfig {
            default_owner: cli.default_owner,
        },
    );

    match cli.command {
        Commands::Init => commands::init(&ctx).await,
        Commands::UserAdd {
            id,
            name,
            email,
            team,
            role,
        } => commands::user_add(&ctx, &id, &name, &email, &team, &role).await,
        Commands::Users => commands::users(&ctx).await,
        Commands::Capture {
            name,
            platform,
            source,
            actor,
            email,
            phone,
            budget,
            listeners,
            instagram,
            website,
            label,
        } => {
            commands::capture(
                &ctx,
                &actor,
                commands::CaptureArgs {
                    name,
                    platform,
                    source,
                    email,
                    phone,
                    budget,
                    listeners,
                    instagram,
                    website,
                    label,
                },
            )
            .await
        }
        Commands::Transition {
            lead,
            status,
            actor,
            deal_value,
            lost_reason,
            note,
        } => commands::transition(&ctx, &actor, &lead, &status, deal_value, lost_reason, note).await,
        Commands::Note {
            lead,
            content,
            actor,
            note_type,
            private,
        } => commands::add_note(&ctx, &actor, &lead, &content, &note_type, private).await,
        Commands::FollowUp {
            lead,
            due,
            actor,
            kind,
        } => commands::follow_up(&ctx, &actor, &lead, &due, &kind).await,
        Commands::Reassign { lead, owner, actor } => {
            commands::reassign(&ctx, &actor, &lead, &owner).await
        }
        Commands::Show { lead, actor } => commands::show(&ctx, &actor, &lead).await,
        Commands::Pipeline { actor } => commands::pipeline(&ctx, &actor).await,
        Commands::Audit { command } => match command {
            AuditCommands::Recent { limit } => commands::audit_recent(&ctx, limit).await,
            AuditCommands::Security { limit } => commands::audit_security(&ctx, limit).await,
            AuditCommands::Actor { id, limit } => commands::audit_actor_history(&ctx, &id, limit).await,
            AuditCommands::Resource {
                resource_type,
                id,
                limit,
            } => commands::audit_resource(&ctx, &resource_type, &id, limit).await,
            AuditCommands::Subject { email } => commands::audit_subject(&ctx, &email).await,
            AuditCommands::Suspicious => commands::audit_suspicious(&ctx).await,
            AuditCommands::Archive { days } => commands::audit_archive(&ctx, days).await,
            AuditCommands::Purge => commands::audit_purge(&ctx).await,
        },
    }
}
