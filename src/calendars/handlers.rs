use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateCalendarRequest, UpdateCalendarRequest};
use super::repo_types::Calendar;
use super::services;
use crate::{auth::services::AuthUser, error::AppError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/calendars", get(list_calendars))
        .route("/calendars/default", get(get_default_calendar))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/calendars", post(create_calendar))
        .route(
            "/calendars/:id",
            patch(update_calendar).delete(delete_calendar),
        )
        .route("/calendars/:id/default", post(set_default_calendar))
}

#[instrument(skip(state))]
pub async fn list_calendars(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Calendar>>, AppError> {
    let calendars = services::list_calendars(state.store.as_ref(), user_id).await?;
    Ok(Json(calendars))
}

#[instrument(skip(state))]
pub async fn get_default_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Calendar>, AppError> {
    services::get_default_calendar(state.store.as_ref(), user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("default calendar", user_id))
}

#[instrument(skip(state, payload))]
pub async fn create_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateCalendarRequest>,
) -> Result<(StatusCode, Json<Calendar>), AppError> {
    let calendar =
        services::create_calendar(state.store.as_ref(), user_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(calendar)))
}

#[instrument(skip(state, payload))]
pub async fn update_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCalendarRequest>,
) -> Result<Json<Calendar>, AppError> {
    let calendar =
        services::update_calendar(state.store.as_ref(), id, user_id, payload.into()).await?;
    Ok(Json(calendar))
}

#[instrument(skip(state))]
pub async fn delete_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_calendar(state.store.as_ref(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn set_default_calendar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::set_default_calendar(state.store.as_ref(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
