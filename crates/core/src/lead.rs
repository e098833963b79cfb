//! # Lead Module
//!
//! Defines the Lead aggregate - a prospective artist/customer moving through
//! the sales pipeline - together with its classification enums and the
//! status transition table.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a lead was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    /// Campaign budget simulator widget
    Simulator,
    /// Website contact form
    ContactForm,
    /// Calendly booking
    Calendly,
    /// Entered by hand by an account manager
    Manual,
    /// Referred by an existing client
    Referral,
    /// Inbound from a social profile
    SocialMedia,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Simulator => "simulator",
            LeadSource::ContactForm => "contact_form",
            LeadSource::Calendly => "calendly",
            LeadSource::Manual => "manual",
            LeadSource::Referral => "referral",
            LeadSource::SocialMedia => "social_media",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "simulator" => Some(LeadSource::Simulator),
            "contact_form" => Some(LeadSource::ContactForm),
            "calendly" => Some(LeadSource::Calendly),
            "manual" => Some(LeadSource::Manual),
            "referral" => Some(LeadSource::Referral),
            "social_media" => Some(LeadSource::SocialMedia),
            _ => None,
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marketing platform a lead originated from or targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Spotify,
    Meta,
    Tiktok,
    Google,
    /// Campaigns across more than one platform
    Multiple,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Spotify => "spotify",
            Platform::Meta => "meta",
            Platform::Tiktok => "tiktok",
            Platform::Google => "google",
            Platform::Multiple => "multiple",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "youtube" => Some(Platform::Youtube),
            "spotify" => Some(Platform::Spotify),
            "meta" => Some(Platform::Meta),
            "tiktok" => Some(Platform::Tiktok),
            "google" => Some(Platform::Google),
            "multiple" => Some(Platform::Multiple),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of the two fixed account-management teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Owns YouTube and Spotify campaigns
    Streaming,
    /// Owns Meta and TikTok campaigns
    Social,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Streaming => "streaming",
            Team::Social => "social",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "streaming" => Some(Team::Streaming),
            "social" => Some(Team::Social),
            _ => None,
        }
    }

    /// The other team (used by the two-way load balance)
    pub fn other(&self) -> Team {
        match self {
            Team::Streaming => Team::Social,
            Team::Social => Team::Streaming,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline status of a lead.
///
/// The main pipeline runs new -> contacted -> qualified -> proposal_sent ->
/// negotiation -> won/lost. `on_hold` is a side state reachable from any
/// non-terminal status. `won` and `lost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    ProposalSent,
    Negotiation,
    Won,
    Lost,
    OnHold,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::ProposalSent => "proposal_sent",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
            LeadStatus::OnHold => "on_hold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "qualified" => Some(LeadStatus::Qualified),
            "proposal_sent" => Some(LeadStatus::ProposalSent),
            "negotiation" => Some(LeadStatus::Negotiation),
            "won" => Some(LeadStatus::Won),
            "lost" => Some(LeadStatus::Lost),
            "on_hold" => Some(LeadStatus::OnHold),
            _ => None,
        }
    }

    /// Won and Lost accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }

    /// Position in the main pipeline; None for won/lost/on_hold
    fn stage(&self) -> Option<u8> {
        match self {
            LeadStatus::New => Some(0),
            LeadStatus::Contacted => Some(1),
            LeadStatus::Qualified => Some(2),
            LeadStatus::ProposalSent => Some(3),
            LeadStatus::Negotiation => Some(4),
            _ => None,
        }
    }

    /// Whether `self -> to` is an allowed transition.
    ///
    /// Forward moves along the pipeline may skip stages. `lost` is reachable
    /// from any non-terminal status, `won` from any non-terminal status
    /// except `new`. `on_hold` round-trips to and from any non-terminal
    /// status. Self-transitions are rejected.
    pub fn can_transition_to(&self, to: LeadStatus) -> bool {
        if *self == to || self.is_terminal() {
            return false;
        }
        match to {
            LeadStatus::OnHold => true,
            LeadStatus::Lost => true,
            LeadStatus::Won => *self != LeadStatus::New,
            _ => match (self.stage(), to.stage()) {
                (Some(from), Some(target)) => target > from,
                // Resuming from on_hold may land on any pipeline stage
                (None, Some(_)) => *self == LeadStatus::OnHold,
                _ => false,
            },
        }
    }

    /// Validate a transition, returning a typed error when not allowed
    pub fn ensure_transition_to(&self, to: LeadStatus) -> CoreResult<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: *self,
                to,
            })
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work priority assigned to a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality bucket derived from the lead score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadQuality {
    Cold,
    Warm,
    Hot,
}

impl LeadQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadQuality::Cold => "cold",
            LeadQuality::Warm => "warm",
            LeadQuality::Hot => "hot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cold" => Some(LeadQuality::Cold),
            "warm" => Some(LeadQuality::Warm),
            "hot" => Some(LeadQuality::Hot),
            _ => None,
        }
    }

    /// Bucket for a 0-100 lead score: >=70 hot, >=40 warm, else cold
    pub fn for_score(score: u8) -> Self {
        if score >= 70 {
            LeadQuality::Hot
        } else if score >= 40 {
            LeadQuality::Warm
        } else {
            LeadQuality::Cold
        }
    }
}

impl fmt::Display for LeadQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of reasons a deal was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostReason {
    Budget,
    Timing,
    Competitor,
    NoResponse,
    NotInterested,
    Other,
}

impl LostReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LostReason::Budget => "budget",
            LostReason::Timing => "timing",
            LostReason::Competitor => "competitor",
            LostReason::NoResponse => "no_response",
            LostReason::NotInterested => "not_interested",
            LostReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "budget" => Some(LostReason::Budget),
            "timing" => Some(LostReason::Timing),
            "competitor" => Some(LostReason::Competitor),
            "no_response" => Some(LostReason::NoResponse),
            "not_interested" => Some(LostReason::NotInterested),
            "other" => Some(LostReason::Other),
            _ => None,
        }
    }
}

impl fmt::Display for LostReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A prospective customer record.
///
/// A Lead always has exactly one owner and one team, both set at creation by
/// the assignment engine and changed only through an explicit reassignment.
/// `email` and `phone` hold encrypted envelopes at rest; plaintext exists
/// only at the read boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    /// Contact name
    pub name: String,
    /// Stage/artist name, if distinct from the contact name
    pub artist_name: Option<String>,
    pub source: LeadSource,
    pub platform: Platform,
    /// Owner user id
    pub assigned_to: String,
    pub team: Team,
    pub status: LeadStatus,
    pub priority: Priority,
    pub quality: LeadQuality,
    /// PII - encrypted at rest
    pub email: Option<String>,
    /// PII - encrypted at rest
    pub phone: Option<String>,
    pub budget: Option<Decimal>,
    pub deal_value: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub commission_rate: Option<Decimal>,
    /// Monthly listeners on the lead's primary streaming profile
    pub monthly_listeners: Option<i64>,
    pub instagram: Option<String>,
    pub tiktok_handle: Option<String>,
    pub website: Option<String>,
    /// Record label, if signed
    pub label: Option<String>,
    /// 0-100, recomputed on every mutating save
    pub lead_score: u8,
    pub follow_up_count: i64,
    pub lost_reason: Option<LostReason>,
    pub first_contact_date: Option<DateTime<Utc>>,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub won_date: Option<DateTime<Utc>>,
    pub lost_date: Option<DateTime<Utc>>,
    pub next_follow_up: Option<DateTime<Utc>>,
    /// Archived leads are excluded from pipeline queries and load balancing
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Create a new lead in status `new`, already assigned to an owner/team
    pub fn new(
        name: impl Into<String>,
        source: LeadSource,
        platform: Platform,
        assigned_to: impl Into<String>,
        team: Team,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            artist_name: None,
            source,
            platform,
            assigned_to: assigned_to.into(),
            team,
            status: LeadStatus::New,
            priority: Priority::Medium,
            quality: LeadQuality::Cold,
            email: None,
            phone: None,
            budget: None,
            deal_value: None,
            commission: None,
            commission_rate: None,
            monthly_listeners: None,
            instagram: None,
            tiktok_handle: None,
            website: None,
            label: None,
            lead_score: 0,
            follow_up_count: 0,
            lost_reason: None,
            first_contact_date: None,
            last_contact_date: None,
            last_activity_date: None,
            won_date: None,
            lost_date: None,
            next_follow_up: None,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Still counts toward the active pipeline and load balancing
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal() && !self.is_archived
    }

    /// Minutes from capture to first contact, if contact was made
    pub fn response_minutes(&self) -> Option<i64> {
        self.first_contact_date
            .map(|first| (first - self.created_at).num_minutes())
    }

    /// Recompute the lead score and quality bucket from current fields
    pub fn rescore(&mut self) {
        self.lead_score = crate::score::score(self);
        self.quality = LeadQuality::for_score(self.lead_score);
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lead {} ({}, {}, owner: {}, status: {}, score: {})",
            self.id, self.name, self.platform, self.assigned_to, self.status, self.lead_score
        )
    }
}
