//! Persistence collaborator for the moderation engine.
//!
//! The engine never assumes multi-table transactions. Every method here is a single-table
//! write or read; status-changing writes are conditional on the expected prior status and
//! report how many rows they touched so callers can detect lost races.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    EventFilter, EventPatch, EventStatus, ParentSide, PublishedEvent, SubmittedEvent,
    TicketParent, TicketType,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct NewPendingEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub organizer_id: String,
}

#[derive(Debug, Clone)]
pub struct NewPublishedEvent {
    pub source_pending_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub organizer_id: String,
}

impl From<&SubmittedEvent> for NewPublishedEvent {
    fn from(event: &SubmittedEvent) -> Self {
        Self {
            source_pending_id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            date: event.date,
            image_url: event.image_url.clone(),
            organizer_id: event.organizer_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: Option<i32>,
}

/// Content revision a status write is conditional on, keyed by `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    Any,
    /// Only the content as loaded; `At(None)` means never edited.
    At(Option<DateTime<Utc>>),
}

/// Terminal status write applied to a pending row.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: EventStatus,
    pub acted_by: String,
    pub acted_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    pub revision: Revision,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_pending(&self, event: NewPendingEvent) -> Result<SubmittedEvent, StoreError>;

    async fn find_pending(&self, id: Uuid) -> Result<Option<SubmittedEvent>, StoreError>;

    /// Pending-area rows matching `filter`, newest first. Tickets are not attached.
    async fn query_pending(&self, filter: &EventFilter) -> Result<Vec<SubmittedEvent>, StoreError>;

    /// `UPDATE ... SET status ... WHERE id = ? AND status = expected`, plus an `updated_at`
    /// match when `change.revision` pins one.
    async fn update_status(
        &self,
        id: Uuid,
        expected: EventStatus,
        change: StatusChange,
    ) -> Result<u64, StoreError>;

    /// Content edit, conditional on `expected` status.
    async fn update_content(
        &self,
        id: Uuid,
        expected: EventStatus,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Conditional delete; the row's tickets go with it (`ON DELETE CASCADE`).
    async fn delete_pending(&self, id: Uuid, expected: EventStatus) -> Result<u64, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when `source_pending_id` was already published.
    async fn insert_published(
        &self,
        event: NewPublishedEvent,
    ) -> Result<PublishedEvent, StoreError>;

    async fn find_published(&self, id: Uuid) -> Result<Option<PublishedEvent>, StoreError>;

    /// Published rows, newest first. Tickets are not attached.
    async fn query_published(&self, limit: Option<i64>) -> Result<Vec<PublishedEvent>, StoreError>;

    /// Published rows whose title or location contains `query`, case-insensitively,
    /// newest first. An empty query matches everything.
    async fn search_published(&self, query: &str) -> Result<Vec<PublishedEvent>, StoreError>;

    /// Deletes the row and, by cascade, its tickets.
    async fn delete_published(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Inserts all rows in one statement; either every ticket lands or none does.
    async fn insert_tickets(
        &self,
        parent: TicketParent,
        tickets: &[NewTicket],
    ) -> Result<Vec<TicketType>, StoreError>;

    /// Ticket rows attached to any of `ids` on the given side, oldest first.
    async fn tickets_for(
        &self,
        side: ParentSide,
        ids: &[Uuid],
    ) -> Result<Vec<TicketType>, StoreError>;

    /// Moves every ticket row from one parent to another. Returns the rows moved.
    async fn repoint_tickets(
        &self,
        from: TicketParent,
        to: TicketParent,
    ) -> Result<u64, StoreError>;
}
