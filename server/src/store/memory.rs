//! In-process [`EventStore`] used for local development and tests.
//!
//! Each method takes the state lock once and never awaits while holding it, so every call is
//! atomic with respect to the others, matching the per-row guarantees of the SQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{
    EventStore, NewPendingEvent, NewPublishedEvent, NewTicket, Revision, StatusChange,
    StoreError,
};
use crate::models::{
    EventFilter, EventPatch, EventStatus, ParentSide, PublishedEvent, SubmittedEvent,
    TicketParent, TicketType,
};

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertPending,
    FindPending,
    QueryPending,
    UpdateStatus,
    UpdateContent,
    DeletePending,
    InsertPublished,
    SearchPublished,
    DeletePublished,
    InsertTickets,
    RepointTickets,
}

#[derive(Default)]
struct State {
    pending: Vec<SubmittedEvent>,
    published: Vec<PublishedEvent>,
    tickets: Vec<TicketType>,
    failures: HashMap<StoreOp, usize>,
}

impl State {
    fn check(&mut self, op: StoreOp) -> Result<(), StoreError> {
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected failure on {:?}", op)))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls of `op` fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        self.lock().failures.insert(op, times);
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn published_snapshot(&self) -> Vec<PublishedEvent> {
        self.lock().published.clone()
    }

    pub fn tickets_snapshot(&self) -> Vec<TicketType> {
        self.lock().tickets.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first<T>(mut rows: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    // Rows are kept in insertion order; reversing first makes the stable sort break
    // timestamp ties in favour of the later insert.
    rows.reverse();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

fn attach(ticket: &mut TicketType, parent: TicketParent) {
    match parent {
        TicketParent::Pending(id) => {
            ticket.event_pending_id = Some(id);
            ticket.event_id = None;
        }
        TicketParent::Published(id) => {
            ticket.event_pending_id = None;
            ticket.event_id = Some(id);
        }
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_pending(&self, event: NewPendingEvent) -> Result<SubmittedEvent, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::InsertPending)?;

        let row = SubmittedEvent {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            location: event.location,
            date: event.date,
            image_url: event.image_url,
            organizer_id: event.organizer_id,
            status: EventStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: None,
            tickets: Vec::new(),
        };
        state.pending.push(row.clone());
        Ok(row)
    }

    async fn find_pending(&self, id: Uuid) -> Result<Option<SubmittedEvent>, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::FindPending)?;
        Ok(state.pending.iter().find(|e| e.id == id).cloned())
    }

    async fn query_pending(&self, filter: &EventFilter) -> Result<Vec<SubmittedEvent>, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::QueryPending)?;
        let rows = state
            .pending
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(newest_first(rows, |e: &SubmittedEvent| e.created_at))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: EventStatus,
        change: StatusChange,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::UpdateStatus)?;

        let Some(row) = state.pending.iter_mut().find(|e| {
            e.id == id
                && e.status == expected
                && match change.revision {
                    Revision::Any => true,
                    Revision::At(updated_at) => e.updated_at == updated_at,
                }
        }) else {
            return Ok(0);
        };
        row.status = change.status;
        row.approved_by = Some(change.acted_by);
        row.approved_at = Some(change.acted_at);
        row.rejection_reason = change.rejection_reason;
        Ok(1)
    }

    async fn update_content(
        &self,
        id: Uuid,
        expected: EventStatus,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::UpdateContent)?;

        let Some(row) = state
            .pending
            .iter_mut()
            .find(|e| e.id == id && e.status == expected)
        else {
            return Ok(0);
        };
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(description) = &patch.description {
            row.description = description.clone();
        }
        if let Some(location) = &patch.location {
            row.location = location.clone();
        }
        if let Some(date) = patch.date {
            row.date = date;
        }
        if let Some(image_url) = &patch.image_url {
            row.image_url = Some(image_url.clone());
        }
        row.updated_at = Some(updated_at);
        Ok(1)
    }

    async fn delete_pending(&self, id: Uuid, expected: EventStatus) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::DeletePending)?;

        let before = state.pending.len();
        state
            .pending
            .retain(|e| !(e.id == id && e.status == expected));
        let removed = before - state.pending.len();
        if removed > 0 {
            // Mirrors ON DELETE CASCADE.
            state.tickets.retain(|t| t.event_pending_id != Some(id));
        }
        Ok(removed as u64)
    }

    async fn insert_published(
        &self,
        event: NewPublishedEvent,
    ) -> Result<PublishedEvent, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::InsertPublished)?;

        if state
            .published
            .iter()
            .any(|p| p.source_pending_id == event.source_pending_id)
        {
            return Err(StoreError::Duplicate(format!(
                "source_pending_id {} already published",
                event.source_pending_id
            )));
        }

        let row = PublishedEvent {
            id: Uuid::new_v4(),
            source_pending_id: event.source_pending_id,
            title: event.title,
            description: event.description,
            location: event.location,
            date: event.date,
            image_url: event.image_url,
            organizer_id: event.organizer_id,
            created_at: Utc::now(),
            tickets: Vec::new(),
        };
        state.published.push(row.clone());
        Ok(row)
    }

    async fn find_published(&self, id: Uuid) -> Result<Option<PublishedEvent>, StoreError> {
        Ok(self.lock().published.iter().find(|e| e.id == id).cloned())
    }

    async fn query_published(&self, limit: Option<i64>) -> Result<Vec<PublishedEvent>, StoreError> {
        let rows = self.lock().published.clone();
        let mut rows = newest_first(rows, |e: &PublishedEvent| e.created_at);
        if let Some(limit) = limit {
            rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    async fn search_published(&self, query: &str) -> Result<Vec<PublishedEvent>, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::SearchPublished)?;

        let needle = query.trim().to_lowercase();
        let rows = state
            .published
            .iter()
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.location.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(newest_first(rows, |e: &PublishedEvent| e.created_at))
    }

    async fn delete_published(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::DeletePublished)?;

        let before = state.published.len();
        state.published.retain(|e| e.id != id);
        let removed = before - state.published.len();
        if removed > 0 {
            state.tickets.retain(|t| t.event_id != Some(id));
        }
        Ok(removed as u64)
    }

    async fn insert_tickets(
        &self,
        parent: TicketParent,
        tickets: &[NewTicket],
    ) -> Result<Vec<TicketType>, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::InsertTickets)?;

        let parent_exists = match parent {
            TicketParent::Pending(id) => state.pending.iter().any(|e| e.id == id),
            TicketParent::Published(id) => state.published.iter().any(|e| e.id == id),
        };
        if !parent_exists {
            return Err(StoreError::Unavailable(format!(
                "foreign key violation: parent {} does not exist",
                parent.id()
            )));
        }

        let now = Utc::now();
        let rows: Vec<TicketType> = tickets
            .iter()
            .map(|draft| {
                let mut row = TicketType {
                    id: Uuid::new_v4(),
                    event_pending_id: None,
                    event_id: None,
                    name: draft.name.clone(),
                    description: draft.description.clone(),
                    price: draft.price,
                    quantity: draft.quantity,
                    created_at: now,
                };
                attach(&mut row, parent);
                row
            })
            .collect();
        state.tickets.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn tickets_for(
        &self,
        side: ParentSide,
        ids: &[Uuid],
    ) -> Result<Vec<TicketType>, StoreError> {
        let state = self.lock();
        Ok(state
            .tickets
            .iter()
            .filter(|t| {
                let key = match side {
                    ParentSide::Pending => t.event_pending_id,
                    ParentSide::Published => t.event_id,
                };
                key.is_some_and(|k| ids.contains(&k))
            })
            .cloned()
            .collect())
    }

    async fn repoint_tickets(
        &self,
        from: TicketParent,
        to: TicketParent,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.check(StoreOp::RepointTickets)?;

        let mut moved = 0;
        for ticket in state.tickets.iter_mut() {
            if ticket.parent() == Some(from) {
                attach(ticket, to);
                moved += 1;
            }
        }
        Ok(moved)
    }
}
