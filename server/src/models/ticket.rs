use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A priced admission category of an event.
///
/// Exactly one of `event_pending_id` and `event_id` is set at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_pending_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl TicketType {
    pub fn parent(&self) -> Option<TicketParent> {
        match (self.event_pending_id, self.event_id) {
            (Some(id), None) => Some(TicketParent::Pending(id)),
            (None, Some(id)) => Some(TicketParent::Published(id)),
            _ => None,
        }
    }
}

/// Which side of the moderation workflow a ticket row hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketParent {
    Pending(Uuid),
    Published(Uuid),
}

impl TicketParent {
    pub fn id(&self) -> Uuid {
        match self {
            TicketParent::Pending(id) | TicketParent::Published(id) => *id,
        }
    }

    pub fn side(&self) -> ParentSide {
        match self {
            TicketParent::Pending(_) => ParentSide::Pending,
            TicketParent::Published(_) => ParentSide::Published,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentSide {
    Pending,
    Published,
}

impl ParentSide {
    /// Foreign key column on the tickets table.
    pub fn column(&self) -> &'static str {
        match self {
            ParentSide::Pending => "event_pending_id",
            ParentSide::Published => "event_id",
        }
    }
}

/// Ticket type as supplied with a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketDraft {
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}
