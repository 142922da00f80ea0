use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::moderation::ModerationError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error")]
    PersistenceError(#[source] ModerationError),
}

impl From<ModerationError> for AppError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::Validation(msg) => AppError::ValidationError(msg),
            ModerationError::NotFound(msg) => AppError::NotFound(msg),
            ModerationError::StateConflict(msg) => AppError::Conflict(msg),
            other @ (ModerationError::Persistence { .. } | ModerationError::PartialWrite { .. }) => {
                AppError::PersistenceError(other)
            }
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PersistenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "STATE_CONFLICT",
            AppError::PersistenceError(ModerationError::PartialWrite { .. }) => "PARTIAL_WRITE",
            AppError::PersistenceError(_) => "PERSISTENCE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::PersistenceError(e) => {
                error!(
                    code = self.code(),
                    step = ?e.step(),
                    error = %e,
                    "Persistence error"
                );
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::PersistenceError(_) => "A database error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Store failures never reach the client
        error_response(code, self.public_message(), None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::Step;
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_moderation_errors_map_to_http_statuses() {
        let cases = [
            (
                ModerationError::Validation("title is required".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ModerationError::NotFound("event missing".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (ModerationError::not_pending(), StatusCode::CONFLICT),
            (
                ModerationError::Persistence {
                    step: Step::MarkApproved,
                    source: StoreError::Unavailable("down".to_string()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ModerationError::PartialWrite {
                    pending_id: Uuid::new_v4(),
                    source: StoreError::Unavailable("down".to_string()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_store_details_are_hidden() {
        let err = AppError::from(ModerationError::Persistence {
            step: Step::InsertTickets,
            source: StoreError::Unavailable("password authentication failed".to_string()),
        });

        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert_eq!(err.public_message(), "A database error occurred");
    }

    #[test]
    fn test_conflict_message_is_public() {
        let err = AppError::from(ModerationError::not_pending());

        assert_eq!(err.code(), "STATE_CONFLICT");
        assert_eq!(err.public_message(), "event is not in pending status");
    }
}
