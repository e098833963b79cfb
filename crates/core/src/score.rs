//! # Scoring Module
//!
//! Deterministic 0-100 lead quality score.
//!
//! The score is a weighted sum of five independent bands, each capped, with
//! the total capped at 100. Pure function of the lead's fields - no I/O, no
//! clock reads - so the same lead always scores the same.

use crate::lead::{Lead, LeadSource};
use rust_decimal::Decimal;

/// Maximum total score
pub const MAX_SCORE: u8 = 100;

/// Compute the lead score from its declared inputs.
///
/// Recomputed on every mutating save; callers never write the score
/// directly.
pub fn score(lead: &Lead) -> u8 {
    let total = budget_band(lead.budget)
        + audience_band(lead.monthly_listeners)
        + engagement_band(lead)
        + source_band(lead.source)
        + responsiveness_band(lead.response_minutes());

    total.min(MAX_SCORE as u32) as u8
}

/// Budget band, 0-30. Absent budget contributes nothing.
fn budget_band(budget: Option<Decimal>) -> u32 {
    let Some(budget) = budget else { return 0 };

    if budget >= Decimal::from(10_000) {
        30
    } else if budget >= Decimal::from(5_000) {
        20
    } else if budget >= Decimal::from(1_000) {
        10
    } else {
        5
    }
}

/// Audience-size band, 0-25, from monthly listeners.
fn audience_band(monthly_listeners: Option<i64>) -> u32 {
    let Some(listeners) = monthly_listeners else {
        return 0;
    };

    if listeners >= 100_000 {
        25
    } else if listeners >= 50_000 {
        20
    } else if listeners >= 10_000 {
        15
    } else if listeners >= 1_000 {
        10
    } else {
        5
    }
}

/// Engagement-signal band, 0-20: social profile, website, label.
fn engagement_band(lead: &Lead) -> u32 {
    let mut points = 0;
    if lead.instagram.is_some() || lead.tiktok_handle.is_some() {
        points += 10;
    }
    if lead.website.is_some() {
        points += 5;
    }
    if lead.label.is_some() {
        points += 5;
    }
    points
}

/// Source-quality band, 0-15.
fn source_band(source: LeadSource) -> u32 {
    match source {
        LeadSource::Referral => 15,
        LeadSource::Calendly => 12,
        LeadSource::ContactForm => 8,
        LeadSource::Simulator => 5,
        _ => 3,
    }
}

/// Responsiveness band, 0-10, from minutes to first contact.
/// Unmeasured (no first contact yet) contributes nothing.
fn responsiveness_band(response_minutes: Option<i64>) -> u32 {
    let Some(minutes) = response_minutes else {
        return 0;
    };

    if minutes <= 60 {
        10
    } else if minutes <= 240 {
        7
    } else if minutes <= 1_440 {
        5
    } else {
        2
    }
}
