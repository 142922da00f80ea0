use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ticket::{TicketDraft, TicketType};

/// Moderation status of a submitted event.
///
/// The only legal moves are `Pending -> Approved` and `Pending -> Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EventStatus::Pending)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A row of the pending area, annotated with the ticket types it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedEvent {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub organizer_id: String,
    pub status: EventStatus,
    /// Who acted on the event. Set for rejections as well as approvals.
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tickets: Vec<TicketType>,
}

/// A row of the published area. Only ever created by an approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub id: Uuid,
    pub source_pending_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub organizer_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tickets: Vec<TicketType>,
}

/// Submission payload for a new event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub date: DateTime<Utc>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub organizer_id: String,
    #[serde(default)]
    pub tickets: Vec<TicketDraft>,
}

/// Content edit of a pending event. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.date.is_none()
            && self.image_url.is_none()
    }
}

/// Listing filter over the pending area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub organizer_id: Option<String>,
}

impl EventFilter {
    pub fn with_status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            organizer_id: None,
        }
    }

    pub fn matches(&self, event: &SubmittedEvent) -> bool {
        self.status.map_or(true, |s| event.status == s)
            && self
                .organizer_id
                .as_deref()
                .map_or(true, |o| event.organizer_id == o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!("Pending".parse::<EventStatus>(), Ok(EventStatus::Pending));
        assert_eq!(" approved ".parse::<EventStatus>(), Ok(EventStatus::Approved));
        assert_eq!("rejected".parse::<EventStatus>(), Ok(EventStatus::Rejected));
        assert!("archived".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&EventStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        assert_eq!(EventStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn test_empty_patch_detection() {
        assert!(EventPatch::default().is_empty());

        let patch = EventPatch {
            location: Some("Jakarta".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_draft_accepts_camel_case_image_url() {
        let draft: EventDraft = serde_json::from_value(serde_json::json!({
            "title": "Indie Fest",
            "description": "Three stages",
            "location": "Bandung",
            "date": "2026-11-01T12:00:00Z",
            "imageUrl": "https://cdn.example.com/indie.png",
            "organizer_id": "org-1",
            "tickets": [{ "name": "VIP", "price": 500000 }]
        }))
        .unwrap();

        assert_eq!(
            draft.image_url.as_deref(),
            Some("https://cdn.example.com/indie.png")
        );
        assert_eq!(draft.tickets.len(), 1);
    }
}
