use std::sync::Arc;

use crate::moderation::ModerationService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService>,
}

impl AppState {
    pub fn new(moderation: ModerationService) -> Self {
        Self {
            moderation: Arc::new(moderation),
        }
    }
}
