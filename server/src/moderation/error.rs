use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// The store write a multi-step operation was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    InsertPendingEvent,
    InsertTickets,
    LoadEvent,
    InsertPublishedEvent,
    MigrateTickets,
    MarkApproved,
    MarkRejected,
    UpdateEvent,
    DeleteEvent,
    ListEvents,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::InsertPendingEvent => "insert_pending_event",
            Step::InsertTickets => "insert_tickets",
            Step::LoadEvent => "load_event",
            Step::InsertPublishedEvent => "insert_published_event",
            Step::MigrateTickets => "migrate_tickets",
            Step::MarkApproved => "mark_approved",
            Step::MarkRejected => "mark_rejected",
            Step::UpdateEvent => "update_event",
            Step::DeleteEvent => "delete_event",
            Step::ListEvents => "list_events",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("persistence failure during {step}: {source}")]
    Persistence {
        step: Step,
        #[source]
        source: StoreError,
    },

    /// The pending row was written but its tickets were not, and the compensating delete
    /// also failed. The orphan has to be cleaned up by an operator.
    #[error("event {pending_id} was created without its ticket types: {source}")]
    PartialWrite {
        pending_id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl ModerationError {
    pub fn persistence(step: Step) -> impl FnOnce(StoreError) -> Self {
        move |source| ModerationError::Persistence { step, source }
    }

    pub fn not_pending() -> Self {
        ModerationError::StateConflict("event is not in pending status".to_string())
    }

    /// The event was edited after the approval loaded it; it is still pending.
    pub fn modified_during_approval() -> Self {
        ModerationError::StateConflict(
            "event was modified while being approved, review it again".to_string(),
        )
    }

    pub fn event_not_found(id: Uuid) -> Self {
        ModerationError::NotFound(format!("event {} not found", id))
    }

    /// The failed step, for persistence-class errors.
    pub fn step(&self) -> Option<Step> {
        match self {
            ModerationError::Persistence { step, .. } => Some(*step),
            ModerationError::PartialWrite { .. } => Some(Step::InsertTickets),
            _ => None,
        }
    }

    /// Whether the error is a store failure rather than a caller mistake.
    pub fn is_persistence(&self) -> bool {
        self.step().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_names_the_step() {
        let err = ModerationError::persistence(Step::MigrateTickets)(StoreError::Unavailable(
            "connection reset".to_string(),
        ));

        assert_eq!(err.step(), Some(Step::MigrateTickets));
        assert!(err.to_string().contains("migrate_tickets"));
        assert!(err.is_persistence());
    }

    #[test]
    fn test_caller_errors_have_no_step() {
        assert_eq!(ModerationError::not_pending().step(), None);
        assert!(!ModerationError::Validation("x".to_string()).is_persistence());
    }
}
