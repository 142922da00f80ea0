//! Public read paths over the published area, plus admin delete.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, query_params};
use crate::moderation::DEFAULT_LATEST_COUNT;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, list, success};

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestQuery {
    pub count: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

fn non_negative(name: &str, value: Option<i64>) -> Result<Option<i64>, AppError> {
    match value {
        Some(v) if v < 0 => Err(AppError::ValidationError(format!(
            "{} must not be negative",
            name
        ))),
        other => Ok(other),
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = query_params(query)?;
    let limit = non_negative("limit", query.limit)?;
    let events = state.moderation.list_published(limit).await?;

    Ok(list(events, "Events fetched successfully"))
}

pub async fn latest_events(
    State(state): State<AppState>,
    query: Result<Query<LatestQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = query_params(query)?;
    let count = non_negative("count", query.count)?.unwrap_or(DEFAULT_LATEST_COUNT);
    let events = state.moderation.latest_published(count).await?;

    Ok(list(events, "Latest events fetched successfully"))
}

pub async fn search_events(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let query = query_params(query)?;
    let events = state.moderation.search_published(&query.query).await?;

    Ok(list(events, "Search results fetched successfully"))
}

/// `GET /api/events/:id` accepts either an event id or a title slug.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> Result<Response, AppError> {
    let event = match Uuid::parse_str(&id_or_slug) {
        Ok(id) => state.moderation.get_published(id).await?,
        Err(_) => state.moderation.get_published_by_slug(&id_or_slug).await?,
    }
    .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(success(event, "Event fetched successfully"))
}

pub async fn event_tickets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let tickets = state.moderation.published_tickets(id).await?;

    Ok(list(tickets, "Tickets fetched successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    state.moderation.delete_published(id).await?;

    Ok(empty_success("Event deleted successfully"))
}
