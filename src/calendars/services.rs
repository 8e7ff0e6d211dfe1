use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{Calendar, DEFAULT_COLOR};
use crate::{
    error::{AppError, AppResult},
    store::{Store, StoreTx},
};

pub(crate) fn is_valid_color(color: &str) -> bool {
    lazy_static! {
        static ref COLOR_RE: Regex = Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").unwrap();
    }
    COLOR_RE.is_match(color)
}

pub(crate) fn check_color(color: Option<&str>) -> AppResult<()> {
    match color {
        Some(c) if !is_valid_color(c) => Err(AppError::validation("invalid color format")),
        _ => Ok(()),
    }
}

fn check_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct NewCalendar {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_visible: Option<bool>,
}

async fn lock_owner(tx: &mut dyn StoreTx, user_id: Uuid) -> AppResult<()> {
    if !tx.lock_user(user_id).await? {
        return Err(AppError::not_found("user", user_id));
    }
    Ok(())
}

/// Creates a calendar. The user's first calendar always becomes the default;
/// a later one does so only when asked, displacing the previous default.
#[instrument(skip_all, fields(%user_id))]
pub async fn create_calendar(
    store: &dyn Store,
    user_id: Uuid,
    input: NewCalendar,
) -> AppResult<Calendar> {
    let name = check_name(&input.name)?;
    check_color(input.color.as_deref())?;

    let mut tx = store.begin().await?;
    lock_owner(&mut *tx, user_id).await?;

    let first = tx.count_calendars(user_id).await? == 0;
    let is_default = first || input.is_default;
    if is_default && !first {
        tx.clear_default_calendars(user_id).await?;
    }

    let now = OffsetDateTime::now_utc();
    let calendar = Calendar {
        id: Uuid::new_v4(),
        user_id,
        name,
        description: input.description,
        color: input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        is_default,
        is_visible: true,
        created_at: now,
        updated_at: now,
    };
    tx.insert_calendar(&calendar).await?;
    tx.commit().await?;

    info!(calendar_id = %calendar.id, is_default, "calendar created");
    Ok(calendar)
}

#[instrument(skip_all, fields(%user_id))]
pub async fn list_calendars(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<Calendar>> {
    let mut tx = store.begin().await?;
    let calendars = tx.list_calendars(user_id).await?;
    tx.commit().await?;
    Ok(calendars)
}

#[instrument(skip_all, fields(%user_id))]
pub async fn get_default_calendar(store: &dyn Store, user_id: Uuid) -> AppResult<Option<Calendar>> {
    let mut tx = store.begin().await?;
    let calendar = tx.find_default_calendar(user_id).await?;
    tx.commit().await?;
    Ok(calendar)
}

/// Atomic swap: clear every default of the user, then mark `calendar_id`.
/// Nothing changes when the calendar is not the user's.
#[instrument(skip_all, fields(%calendar_id, %user_id))]
pub async fn set_default_calendar(
    store: &dyn Store,
    calendar_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let mut tx = store.begin().await?;
    lock_owner(&mut *tx, user_id).await?;

    if tx.find_calendar(calendar_id, user_id).await?.is_none() {
        warn!("set default on unknown calendar");
        return Err(AppError::not_found("calendar", calendar_id));
    }
    let cleared = tx.clear_default_calendars(user_id).await?;
    if !tx.mark_default_calendar(calendar_id, user_id).await? {
        return Err(AppError::not_found("calendar", calendar_id));
    }
    tx.commit().await?;

    info!(cleared, "default calendar set");
    Ok(())
}

#[instrument(skip_all, fields(%calendar_id, %user_id))]
pub async fn update_calendar(
    store: &dyn Store,
    calendar_id: Uuid,
    user_id: Uuid,
    patch: CalendarPatch,
) -> AppResult<Calendar> {
    let name = patch.name.as_deref().map(check_name).transpose()?;
    check_color(patch.color.as_deref())?;

    let mut tx = store.begin().await?;
    let mut calendar = tx
        .find_calendar(calendar_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("calendar", calendar_id))?;

    if let Some(name) = name {
        calendar.name = name;
    }
    if let Some(description) = patch.description {
        calendar.description = Some(description);
    }
    if let Some(color) = patch.color {
        calendar.color = color;
    }
    if let Some(visible) = patch.is_visible {
        calendar.is_visible = visible;
    }
    calendar.updated_at = OffsetDateTime::now_utc();

    tx.update_calendar(&calendar).await?;
    tx.commit().await?;
    info!("calendar updated");
    Ok(calendar)
}

/// Deletes a calendar and its events. When it was the default, the user's
/// oldest remaining calendar is promoted in the same transaction.
#[instrument(skip_all, fields(%calendar_id, %user_id))]
pub async fn delete_calendar(store: &dyn Store, calendar_id: Uuid, user_id: Uuid) -> AppResult<()> {
    let mut tx = store.begin().await?;
    lock_owner(&mut *tx, user_id).await?;

    let calendar = tx
        .find_calendar(calendar_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("calendar", calendar_id))?;
    tx.delete_calendar(calendar_id, user_id).await?;

    if calendar.is_default {
        if let Some(next) = tx.oldest_calendar(user_id).await? {
            tx.mark_default_calendar(next.id, user_id).await?;
            info!(promoted = %next.id, "default calendar reassigned");
        }
    }
    tx.commit().await?;
    info!("calendar deleted");
    Ok(())
}
