use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{CreateWorkingHoursRequest, UpdateWorkingHoursRequest};
use super::repo_types::WorkingHours;
use super::schedule::{SchedulePatch, WeeklySchedule};
use super::services;
use crate::{auth::services::AuthUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/working-hours",
        get(get_working_hours)
            .post(create_working_hours)
            .patch(update_working_hours)
            .delete(delete_working_hours),
    )
}

#[instrument(skip(state))]
pub async fn get_working_hours(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<WorkingHours>, AppError> {
    services::get_working_hours(state.store.as_ref(), user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("working hours", user_id))
}

#[instrument(skip(state, payload))]
pub async fn create_working_hours(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateWorkingHoursRequest>,
) -> Result<(StatusCode, Json<WorkingHours>), AppError> {
    let schedule: WeeklySchedule = payload.try_into()?;
    let hours = services::create_working_hours(state.store.as_ref(), user_id, schedule).await?;
    Ok((StatusCode::CREATED, Json(hours)))
}

#[instrument(skip(state, payload))]
pub async fn update_working_hours(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateWorkingHoursRequest>,
) -> Result<Json<WorkingHours>, AppError> {
    let patch: SchedulePatch = payload.try_into()?;
    let hours = services::update_working_hours(state.store.as_ref(), user_id, patch).await?;
    Ok(Json(hours))
}

#[instrument(skip(state))]
pub async fn delete_working_hours(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, AppError> {
    services::delete_working_hours(state.store.as_ref(), user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
