//! Submission and moderation endpoints under `/api/events-pending`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::{json_body, parse_id, query_params};
use crate::models::{EventDraft, EventFilter, EventPatch, EventStatus};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, list, success};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub organizer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub rejected_by: String,
    #[serde(default)]
    pub rejection_reason: String,
}

fn parse_status(raw: Option<&str>) -> Result<Option<EventStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse::<EventStatus>()
            .map(Some)
            .map_err(|e| AppError::ValidationError(e.to_string())),
        None => Ok(None),
    }
}

pub async fn submit_event(
    State(state): State<AppState>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<Response, AppError> {
    let draft = json_body(payload)?;
    let event = state.moderation.submit_event(draft).await?;

    Ok(created(event, "Event submitted for approval successfully"))
}

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = query_params(query)?;
    let filter = EventFilter {
        status: parse_status(query.status.as_deref())?,
        organizer_id: query.organizer_id.filter(|o| !o.trim().is_empty()),
    };
    let events = state.moderation.list_events(filter).await?;

    Ok(list(events, "Events fetched successfully"))
}

pub async fn list_pending(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state
        .moderation
        .list_events(EventFilter::with_status(EventStatus::Pending))
        .await?;

    Ok(list(events, "Pending events fetched successfully"))
}

pub async fn list_by_organizer(
    State(state): State<AppState>,
    Path(organizer_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = query_params(query)?;
    let filter = EventFilter {
        status: parse_status(query.status.as_deref())?,
        organizer_id: Some(organizer_id),
    };
    let events = state.moderation.list_events(filter).await?;

    Ok(list(events, "Organizer events fetched successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let event = state
        .moderation
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pending event not found".to_string()))?;

    Ok(success(event, "Event fetched successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let patch = json_body(payload)?;
    let event = state.moderation.update_pending_event(id, patch).await?;

    Ok(success(event, "Pending event updated successfully"))
}

pub async fn approve_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let published = state
        .moderation
        .approve_event(id, &request.approved_by)
        .await?;

    Ok(success(published, "Event approved successfully"))
}

pub async fn reject_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let event = state
        .moderation
        .reject_event(id, &request.rejected_by, &request.rejection_reason)
        .await?;

    Ok(success(event, "Event rejected successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    state.moderation.delete_pending_event(id).await?;

    Ok(empty_success("Pending event deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("")).unwrap(), None);
        assert_eq!(
            parse_status(Some("rejected")).unwrap(),
            Some(EventStatus::Rejected)
        );
        assert!(matches!(
            parse_status(Some("archived")),
            Err(AppError::ValidationError(_))
        ));
    }
}
