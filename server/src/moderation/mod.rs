//! Staged publication of submitted events.

pub mod error;
pub mod service;
pub mod slug;
pub mod validation;

pub use error::{ModerationError, Step};
pub use service::{ModerationService, DEFAULT_LATEST_COUNT};
pub use slug::slugify;
