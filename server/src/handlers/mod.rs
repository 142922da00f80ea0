use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::response::{error, success};

pub mod pending;
pub mod published;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    timestamp: String,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "event-moderation-api",
        timestamp: Utc::now().to_rfc3339(),
    };

    success(payload, "Health check successful").into_response()
}

pub async fn route_not_found() -> Response {
    error(
        "NOT_FOUND",
        "Route not found",
        None,
        axum::http::StatusCode::NOT_FOUND,
    )
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::ValidationError(format!("'{}' is not a valid event id", raw)))
}

/// Turns axum's body rejection into the API error envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

/// Same as [`json_body`] for query strings.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_id("indie-fest"),
            Err(AppError::ValidationError(_))
        ));
    }
}
