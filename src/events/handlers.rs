use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::conflict::{check_conflicts, ConflictQuery, ConflictScope};
use super::dto::{
    ConflictCheckRequest, ConflictCheckResponse, CreateEventRequest, RangeQuery,
    UpdateEventRequest,
};
use super::range::query_events_in_range;
use super::repo_types::Event;
use super::services;
use crate::{auth::services::AuthUser, error::AppError, interval::Interval, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
        .route("/events/conflicts", post(find_conflicts))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route(
            "/events/:id",
            axum::routing::patch(update_event).delete(delete_event),
        )
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let calendar_ids = q.calendar_ids()?;
    let events = query_events_in_range(
        state.store.as_ref(),
        user_id,
        calendar_ids.as_deref(),
        q.start,
        q.end,
    )
    .await?;
    Ok(Json(events))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(services::get_event(state.store.as_ref(), id, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let (input, policy) = payload.into_parts();
    let event = services::create_event(state.store.as_ref(), user_id, input, policy).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[instrument(skip(state, payload))]
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<Event>, AppError> {
    let (patch, policy) = payload.into_parts();
    let event = services::update_event(state.store.as_ref(), id, user_id, patch, policy).await?;
    Ok(Json(event))
}

#[instrument(skip(state))]
pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_event(state.store.as_ref(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn find_conflicts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ConflictCheckRequest>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let query = ConflictQuery {
        user_id,
        candidate: Interval::new(payload.start_time, payload.end_time)?,
        exclude_event_id: payload.exclude_event_id,
        scope: payload
            .calendar_id
            .map_or(ConflictScope::AllCalendars, ConflictScope::Calendar),
    };
    let conflicts = check_conflicts(state.store.as_ref(), &query).await?;
    Ok(Json(ConflictCheckResponse {
        has_conflicts: !conflicts.is_empty(),
        conflicts,
    }))
}
