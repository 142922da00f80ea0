pub mod event;
pub mod ticket;

pub use event::{EventDraft, EventFilter, EventPatch, EventStatus, PublishedEvent, SubmittedEvent};
pub use ticket::{ParentSide, TicketDraft, TicketParent, TicketType};
