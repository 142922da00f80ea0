use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::error::{ModerationError, Step};
use super::slug::slugify;
use super::validation::{validate_actor, validate_draft, validate_patch, validate_reason};
use crate::models::{
    EventDraft, EventFilter, EventPatch, EventStatus, ParentSide, PublishedEvent,
    SubmittedEvent, TicketParent, TicketType,
};
use crate::notify::{self, Notification, NotificationKind, NotificationPayload, Notifier};
use crate::store::{EventStore, NewPublishedEvent, Revision, StatusChange, StoreError};

pub type Result<T> = std::result::Result<T, ModerationError>;

/// Number of published events returned by the "latest" shortcut.
pub const DEFAULT_LATEST_COUNT: i64 = 4;

/// Drives submitted events through `pending -> approved | rejected`.
///
/// Both collaborators are injected; the service holds no other state, so one instance is
/// shared across all requests.
#[derive(Clone)]
pub struct ModerationService {
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
}

fn group_tickets(tickets: Vec<TicketType>, side: ParentSide) -> HashMap<Uuid, Vec<TicketType>> {
    let mut grouped: HashMap<Uuid, Vec<TicketType>> = HashMap::new();
    for ticket in tickets {
        let parent = match side {
            ParentSide::Pending => ticket.event_pending_id,
            ParentSide::Published => ticket.event_id,
        };
        if let Some(parent) = parent {
            grouped.entry(parent).or_default().push(ticket);
        }
    }
    grouped
}

impl ModerationService {
    pub fn new(store: Arc<dyn EventStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Creates a pending event with its ticket types.
    ///
    /// If the tickets cannot be written the pending row is deleted again, so the caller
    /// either gets the full event or nothing. Only when that compensating delete also fails
    /// is [`ModerationError::PartialWrite`] returned.
    #[instrument(skip(self, draft), fields(organizer_id = %draft.organizer_id))]
    pub async fn submit_event(&self, draft: EventDraft) -> Result<SubmittedEvent> {
        let (new_event, new_tickets) = validate_draft(&draft)?;

        let mut event = self
            .store
            .insert_pending(new_event)
            .await
            .map_err(ModerationError::persistence(Step::InsertPendingEvent))?;

        match self
            .store
            .insert_tickets(TicketParent::Pending(event.id), &new_tickets)
            .await
        {
            Ok(tickets) => event.tickets = tickets,
            Err(source) => {
                warn!(event_id = %event.id, error = %source, "Ticket insert failed, removing pending event");
                return Err(match self.store.delete_pending(event.id, EventStatus::Pending).await {
                    Ok(_) => ModerationError::Persistence {
                        step: Step::InsertTickets,
                        source,
                    },
                    Err(cleanup) => {
                        error!(event_id = %event.id, error = %cleanup, "Compensating delete failed, orphaned pending event");
                        ModerationError::PartialWrite {
                            pending_id: event.id,
                            source,
                        }
                    }
                });
            }
        }

        info!(event_id = %event.id, tickets = event.tickets.len(), "Event submitted for approval");
        Ok(event)
    }

    /// Pending-area events matching `filter`, newest first, each with its ticket types.
    pub async fn list_events(&self, filter: EventFilter) -> Result<Vec<SubmittedEvent>> {
        let mut events = self
            .store
            .query_pending(&filter)
            .await
            .map_err(ModerationError::persistence(Step::ListEvents))?;
        if events.is_empty() {
            return Ok(events);
        }

        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let tickets = self
            .store
            .tickets_for(ParentSide::Pending, &ids)
            .await
            .map_err(ModerationError::persistence(Step::ListEvents))?;
        let mut grouped = group_tickets(tickets, ParentSide::Pending);

        for event in &mut events {
            event.tickets = grouped.remove(&event.id).unwrap_or_default();
        }
        Ok(events)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<SubmittedEvent>> {
        self.load_event(id).await
    }

    async fn load_event(&self, id: Uuid) -> Result<Option<SubmittedEvent>> {
        let Some(mut event) = self
            .store
            .find_pending(id)
            .await
            .map_err(ModerationError::persistence(Step::LoadEvent))?
        else {
            return Ok(None);
        };

        event.tickets = self
            .store
            .tickets_for(ParentSide::Pending, &[id])
            .await
            .map_err(ModerationError::persistence(Step::LoadEvent))?;
        Ok(Some(event))
    }

    async fn require_pending(&self, id: Uuid) -> Result<SubmittedEvent> {
        let event = self
            .load_event(id)
            .await?
            .ok_or_else(|| ModerationError::event_not_found(id))?;
        if !event.status.is_pending() {
            return Err(ModerationError::not_pending());
        }
        Ok(event)
    }

    /// After a conditional write touched no rows: tell "gone" apart from "moved on".
    async fn conflict_or_missing(&self, id: Uuid, step: Step) -> ModerationError {
        match self.store.find_pending(id).await {
            Ok(Some(_)) => ModerationError::not_pending(),
            Ok(None) => ModerationError::event_not_found(id),
            Err(source) => ModerationError::Persistence { step, source },
        }
    }

    /// Publishes a pending event.
    ///
    /// The published row carries a unique `source_pending_id`, and the final status write is
    /// conditional on the row still being pending with the content that was copied, so
    /// concurrent approvals of the same id yield exactly one published event and an edit
    /// racing the approval is never lost. Any failure after the publish insert undoes the
    /// insert before returning.
    #[instrument(skip(self))]
    pub async fn approve_event(&self, id: Uuid, moderator_id: &str) -> Result<PublishedEvent> {
        let moderator_id = validate_actor("approved_by", moderator_id)?;
        let event = self.require_pending(id).await?;

        let mut published = match self
            .store
            .insert_published(NewPublishedEvent::from(&event))
            .await
        {
            Ok(published) => published,
            Err(StoreError::Duplicate(_)) => return Err(ModerationError::not_pending()),
            Err(source) => {
                return Err(ModerationError::Persistence {
                    step: Step::InsertPublishedEvent,
                    source,
                })
            }
        };
        let pending_parent = TicketParent::Pending(id);
        let published_parent = TicketParent::Published(published.id);

        let moved = match self
            .store
            .repoint_tickets(pending_parent, published_parent)
            .await
        {
            Ok(moved) => moved,
            Err(source) => {
                self.unpublish(&published, None).await;
                return Err(ModerationError::Persistence {
                    step: Step::MigrateTickets,
                    source,
                });
            }
        };

        let change = StatusChange {
            status: EventStatus::Approved,
            acted_by: moderator_id.clone(),
            acted_at: Utc::now(),
            rejection_reason: None,
            revision: Revision::At(event.updated_at),
        };
        match self.store.update_status(id, EventStatus::Pending, change).await {
            Ok(1) => {}
            Ok(_) => {
                warn!(event_id = %id, "Lost approval race, rolling back publish");
                self.unpublish(&published, Some(pending_parent)).await;
                return Err(match self.store.find_pending(id).await {
                    Ok(Some(current)) if current.status.is_pending() => {
                        ModerationError::modified_during_approval()
                    }
                    Ok(Some(_)) => ModerationError::not_pending(),
                    Ok(None) => ModerationError::event_not_found(id),
                    Err(source) => ModerationError::Persistence {
                        step: Step::MarkApproved,
                        source,
                    },
                });
            }
            Err(source) => {
                self.unpublish(&published, Some(pending_parent)).await;
                return Err(ModerationError::Persistence {
                    step: Step::MarkApproved,
                    source,
                });
            }
        }

        // The revision check guarantees the loaded tickets are the ones that moved.
        let published_id = published.id;
        published.tickets = event
            .tickets
            .iter()
            .cloned()
            .map(|mut ticket| {
                ticket.event_pending_id = None;
                ticket.event_id = Some(published_id);
                ticket
            })
            .collect();

        info!(
            event_id = %id,
            published_id = %published.id,
            moderator = %moderator_id,
            tickets = moved,
            "Event approved"
        );

        notify::dispatch(
            &self.notifier,
            Notification {
                kind: NotificationKind::Approval,
                recipient: event.organizer_id.clone(),
                payload: NotificationPayload {
                    event_id: id,
                    event_title: event.title.clone(),
                    published_event_id: Some(published.id),
                    reason: None,
                },
            },
        );

        Ok(published)
    }

    /// Compensation for a failed approval. Moves tickets back to `restore_to` when given,
    /// then deletes the published row. Failures here are logged for operators.
    async fn unpublish(&self, published: &PublishedEvent, restore_to: Option<TicketParent>) {
        let published_parent = TicketParent::Published(published.id);

        if let Some(pending_parent) = restore_to {
            if let Err(e) = self
                .store
                .repoint_tickets(published_parent, pending_parent)
                .await
            {
                error!(
                    published_id = %published.id,
                    source_id = %published.source_pending_id,
                    error = %e,
                    "Failed to move tickets back to pending event"
                );
                return;
            }
        }

        if let Err(e) = self.store.delete_published(published.id).await {
            error!(
                published_id = %published.id,
                source_id = %published.source_pending_id,
                error = %e,
                "Failed to remove published event after aborted approval"
            );
        }
    }

    /// Rejects a pending event. Its ticket types stay attached to it as history.
    #[instrument(skip(self, reason))]
    pub async fn reject_event(
        &self,
        id: Uuid,
        moderator_id: &str,
        reason: &str,
    ) -> Result<SubmittedEvent> {
        let moderator_id = validate_actor("rejected_by", moderator_id)?;
        let reason = validate_reason(reason)?;

        let change = StatusChange {
            status: EventStatus::Rejected,
            acted_by: moderator_id.clone(),
            acted_at: Utc::now(),
            rejection_reason: Some(reason.clone()),
            revision: Revision::Any,
        };
        let affected = self
            .store
            .update_status(id, EventStatus::Pending, change)
            .await
            .map_err(ModerationError::persistence(Step::MarkRejected))?;
        if affected == 0 {
            return Err(self.conflict_or_missing(id, Step::MarkRejected).await);
        }

        let event = self
            .load_event(id)
            .await?
            .ok_or_else(|| ModerationError::event_not_found(id))?;

        info!(event_id = %id, moderator = %moderator_id, "Event rejected");

        notify::dispatch(
            &self.notifier,
            Notification {
                kind: NotificationKind::Rejection,
                recipient: event.organizer_id.clone(),
                payload: NotificationPayload {
                    event_id: id,
                    event_title: event.title.clone(),
                    published_event_id: None,
                    reason: Some(reason),
                },
            },
        );

        Ok(event)
    }

    pub async fn update_pending_event(&self, id: Uuid, patch: EventPatch) -> Result<SubmittedEvent> {
        let patch = validate_patch(&patch)?;

        let affected = self
            .store
            .update_content(id, EventStatus::Pending, &patch, Utc::now())
            .await
            .map_err(ModerationError::persistence(Step::UpdateEvent))?;
        if affected == 0 {
            return Err(self.conflict_or_missing(id, Step::UpdateEvent).await);
        }

        info!(event_id = %id, "Pending event updated");
        self.load_event(id)
            .await?
            .ok_or_else(|| ModerationError::event_not_found(id))
    }

    /// Deletes a pending event and its ticket types. Approved and rejected events are kept.
    ///
    /// The conditional row delete is the only write; tickets go with it by cascade, so an
    /// approval that wins the race keeps every ticket.
    pub async fn delete_pending_event(&self, id: Uuid) -> Result<()> {
        self.require_pending(id).await?;

        let affected = self
            .store
            .delete_pending(id, EventStatus::Pending)
            .await
            .map_err(ModerationError::persistence(Step::DeleteEvent))?;
        if affected == 0 {
            return Err(self.conflict_or_missing(id, Step::DeleteEvent).await);
        }

        info!(event_id = %id, "Pending event deleted");
        Ok(())
    }

    async fn attach_published_tickets(
        &self,
        mut events: Vec<PublishedEvent>,
    ) -> Result<Vec<PublishedEvent>> {
        if events.is_empty() {
            return Ok(events);
        }

        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let tickets = self
            .store
            .tickets_for(ParentSide::Published, &ids)
            .await
            .map_err(ModerationError::persistence(Step::ListEvents))?;
        let mut grouped = group_tickets(tickets, ParentSide::Published);

        for event in &mut events {
            event.tickets = grouped.remove(&event.id).unwrap_or_default();
        }
        Ok(events)
    }

    /// Published events, newest first.
    pub async fn list_published(&self, limit: Option<i64>) -> Result<Vec<PublishedEvent>> {
        let events = self
            .store
            .query_published(limit)
            .await
            .map_err(ModerationError::persistence(Step::ListEvents))?;
        self.attach_published_tickets(events).await
    }

    pub async fn latest_published(&self, count: i64) -> Result<Vec<PublishedEvent>> {
        self.list_published(Some(count)).await
    }

    pub async fn get_published(&self, id: Uuid) -> Result<Option<PublishedEvent>> {
        let event = self
            .store
            .find_published(id)
            .await
            .map_err(ModerationError::persistence(Step::LoadEvent))?;
        match event {
            Some(event) => Ok(self.attach_published_tickets(vec![event]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<PublishedEvent>> {
        let wanted = slugify(slug);
        let event = self
            .store
            .query_published(None)
            .await
            .map_err(ModerationError::persistence(Step::LoadEvent))?
            .into_iter()
            .find(|e| slugify(&e.title) == wanted);
        match event {
            Some(event) => Ok(self.attach_published_tickets(vec![event]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Ticket types of a published event; `NotFound` if the event does not exist.
    pub async fn published_tickets(&self, event_id: Uuid) -> Result<Vec<TicketType>> {
        self.get_published(event_id)
            .await?
            .map(|e| e.tickets)
            .ok_or_else(|| ModerationError::event_not_found(event_id))
    }

    /// Case-insensitive substring search over published titles and locations.
    pub async fn search_published(&self, query: &str) -> Result<Vec<PublishedEvent>> {
        let events = self
            .store
            .search_published(query)
            .await
            .map_err(ModerationError::persistence(Step::ListEvents))?;
        self.attach_published_tickets(events).await
    }

    /// Admin removal of a published event; its ticket types go with it by cascade.
    pub async fn delete_published(&self, id: Uuid) -> Result<()> {
        let affected = self
            .store
            .delete_published(id)
            .await
            .map_err(ModerationError::persistence(Step::DeleteEvent))?;
        if affected == 0 {
            return Err(ModerationError::event_not_found(id));
        }

        info!(event_id = %id, "Published event deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::store::{MemoryStore, StoreOp};
    use rust_decimal::Decimal;

    fn service(store: Arc<MemoryStore>) -> ModerationService {
        ModerationService::new(store, Arc::new(LogNotifier))
    }

    fn draft(title: &str) -> EventDraft {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "description": "Live music all night",
            "location": "Jakarta",
            "date": "2026-12-20T19:00:00Z",
            "organizer_id": "org-1",
            "tickets": [
                { "name": "VIP", "price": 500000, "quantity": 50 },
                { "name": "Regular", "price": 150000 }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_ticket_failure_rolls_back_submission() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreOp::InsertTickets, 1);

        let err = service(store.clone())
            .submit_event(draft("Indie Fest"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ModerationError::Persistence {
                step: Step::InsertTickets,
                ..
            }
        ));
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_partial_write() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreOp::InsertTickets, 1);
        store.fail_next(StoreOp::DeletePending, 1);

        let err = service(store.clone())
            .submit_event(draft("Indie Fest"))
            .await
            .unwrap_err();

        let pending_id = match &err {
            ModerationError::PartialWrite { pending_id, .. } => *pending_id,
            other => panic!("expected partial write, got {:?}", other),
        };
        assert_eq!(store.pending_count(), 1);
        let orphan = store.find_pending(pending_id).await.unwrap().unwrap();
        assert!(orphan.status.is_pending());
    }

    #[tokio::test]
    async fn test_event_insert_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreOp::InsertPending, 1);

        let err = service(store.clone())
            .submit_event(draft("Indie Fest"))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::InsertPendingEvent));
        assert_eq!(store.pending_count(), 0);
        assert!(store.tickets_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_migration_failure_removes_published_row() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());
        let event = svc.submit_event(draft("Indie Fest")).await.unwrap();
        store.fail_next(StoreOp::RepointTickets, 1);

        let err = svc.approve_event(event.id, "admin-1").await.unwrap_err();

        assert_eq!(err.step(), Some(Step::MigrateTickets));
        assert!(store.published_snapshot().is_empty());
        let reloaded = svc.get_event(event.id).await.unwrap().unwrap();
        assert!(reloaded.status.is_pending());
        assert_eq!(reloaded.tickets.len(), 2);
    }

    #[tokio::test]
    async fn test_status_write_failure_restores_tickets() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());
        let event = svc.submit_event(draft("Indie Fest")).await.unwrap();
        store.fail_next(StoreOp::UpdateStatus, 1);

        let err = svc.approve_event(event.id, "admin-1").await.unwrap_err();

        assert_eq!(err.step(), Some(Step::MarkApproved));
        assert!(store.published_snapshot().is_empty());
        let reloaded = svc.get_event(event.id).await.unwrap().unwrap();
        assert!(reloaded.status.is_pending());
        assert_eq!(reloaded.tickets.len(), 2);

        // The aborted attempt left nothing behind, so a retry succeeds.
        let published = svc.approve_event(event.id, "admin-1").await.unwrap();
        assert_eq!(published.tickets.len(), 2);
    }

    #[tokio::test]
    async fn test_approval_keeps_ticket_prices() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store);
        let event = svc.submit_event(draft("Indie Fest")).await.unwrap();

        let published = svc.approve_event(event.id, "admin-1").await.unwrap();

        let mut prices: Vec<(String, Decimal)> = published
            .tickets
            .iter()
            .map(|t| (t.name.clone(), t.price))
            .collect();
        prices.sort();
        assert_eq!(
            prices,
            vec![
                ("Regular".to_string(), Decimal::from(150_000)),
                ("VIP".to_string(), Decimal::from(500_000)),
            ]
        );
    }

    #[tokio::test]
    async fn test_approval_returns_reparented_tickets() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());
        let event = svc.submit_event(draft("Indie Fest")).await.unwrap();

        let published = svc.approve_event(event.id, "admin-1").await.unwrap();

        assert_eq!(published.tickets.len(), 2);
        assert!(published
            .tickets
            .iter()
            .all(|t| t.event_id == Some(published.id) && t.event_pending_id.is_none()));
        let mut returned: Vec<Uuid> = published.tickets.iter().map(|t| t.id).collect();
        let mut stored: Vec<Uuid> = store
            .tickets_for(ParentSide::Published, &[published.id])
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        returned.sort();
        stored.sort();
        assert_eq!(returned, stored);
    }

    #[tokio::test]
    async fn test_delete_published_cascades_tickets() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());
        let event = svc.submit_event(draft("Indie Fest")).await.unwrap();
        let published = svc.approve_event(event.id, "admin-1").await.unwrap();

        svc.delete_published(published.id).await.unwrap();

        assert!(store.tickets_snapshot().is_empty());
        assert!(matches!(
            svc.delete_published(published.id).await,
            Err(ModerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_slug() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store);
        let event = svc.submit_event(draft("Jazz Night: Vol. 2")).await.unwrap();
        svc.approve_event(event.id, "admin-1").await.unwrap();

        let found = svc.get_published_by_slug("jazz-night-vol-2").await.unwrap();

        assert_eq!(found.map(|e| e.source_pending_id), Some(event.id));
        assert!(svc.get_published_by_slug("no-such-event").await.unwrap().is_none());
    }
}
