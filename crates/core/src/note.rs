//! # Note & FollowUp Module
//!
//! Sub-entities owned by a Lead. Their lifetime equals the lead's lifetime;
//! creating one updates the lead's activity timestamps without touching its
//! status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of note attached to a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    General,
    Call,
    Meeting,
    Email,
    /// Authored by the system, e.g. on status transitions
    System,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::General => "general",
            NoteType::Call => "call",
            NoteType::Meeting => "meeting",
            NoteType::Email => "email",
            NoteType::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "general" => Some(NoteType::General),
            "call" => Some(NoteType::Call),
            "meeting" => Some(NoteType::Meeting),
            "email" => Some(NoteType::Email),
            "system" => Some(NoteType::System),
            _ => None,
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A note on a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub lead_id: Uuid,
    /// Author user id, or "system" for machine-authored notes
    pub author: String,
    pub content: String,
    pub note_type: NoteType,
    /// Private notes are visible to the author's team only
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(
        lead_id: Uuid,
        author: impl Into<String>,
        content: impl Into<String>,
        note_type: NoteType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            author: author.into(),
            content: content.into(),
            note_type,
            is_private: false,
            created_at: Utc::now(),
        }
    }

    /// System-authored note, used for transition bookkeeping
    pub fn system(lead_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(lead_id, "system", content, NoteType::System)
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }
}

/// Kind of scheduled follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Call,
    Email,
    Meeting,
    Other,
}

impl FollowUpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpKind::Call => "call",
            FollowUpKind::Email => "email",
            FollowUpKind::Meeting => "meeting",
            FollowUpKind::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" => Some(FollowUpKind::Call),
            "email" => Some(FollowUpKind::Email),
            "meeting" => Some(FollowUpKind::Meeting),
            "other" => Some(FollowUpKind::Other),
            _ => None,
        }
    }
}

impl fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scheduled follow-up on a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: Uuid,
    pub lead_id: Uuid,
    /// User id of the scheduler
    pub scheduled_by: String,
    pub due_at: DateTime<Utc>,
    pub kind: FollowUpKind,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FollowUp {
    pub fn new(
        lead_id: Uuid,
        scheduled_by: impl Into<String>,
        due_at: DateTime<Utc>,
        kind: FollowUpKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            scheduled_by: scheduled_by.into(),
            due_at,
            kind,
            completed: false,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn complete(&mut self) {
        self.completed = true;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_note() {
        let lead_id = Uuid::new_v4();
        let note = Note::system(lead_id, "Status changed from new to contacted");

        assert_eq!(note.author, "system");
        assert_eq!(note.note_type, NoteType::System);
        assert!(!note.is_private);
        assert_eq!(note.lead_id, lead_id);
    }

    #[test]
    fn test_private_note() {
        let note = Note::new(Uuid::new_v4(), "USR_001", "internal pricing remarks", NoteType::General)
            .private();
        assert!(note.is_private);
    }

    #[test]
    fn test_follow_up_completion() {
        let mut follow_up = FollowUp::new(
            Uuid::new_v4(),
            "USR_001",
            Utc::now() + chrono::Duration::days(2),
            FollowUpKind::Call,
        );

        assert!(!follow_up.completed);
        assert!(follow_up.completed_at.is_none());

        follow_up.complete();
        assert!(follow_up.completed);
        assert!(follow_up.completed_at.is_some());
    }
}
