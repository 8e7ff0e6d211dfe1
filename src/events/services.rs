use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::conflict::{find_conflicts_tx, ConflictQuery, ScopeMode};
use super::repo_types::{Event, EventStatus, EventType};
use crate::{
    calendars::services::check_color,
    error::{AppError, AppResult},
    interval::Interval,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub color: Option<String>,
    pub status: EventStatus,
    pub event_type: EventType,
    pub is_recurring: bool,
}

/// Any subset of fields; `None` leaves the stored value.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub all_day: Option<bool>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictPolicy {
    pub check: bool,
    pub scope: ScopeMode,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            check: true,
            scope: ScopeMode::AllCalendars,
        }
    }
}

fn check_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(title.to_string())
}

/// Rejects the write when `policy.check` is on and the event would overlap
/// another live event. Cancelled events never conflict.
async fn enforce_no_conflicts(
    tx: &mut dyn StoreTx,
    event: &Event,
    span: Interval<OffsetDateTime>,
    policy: ConflictPolicy,
) -> AppResult<()> {
    if !policy.check || event.is_cancelled() {
        return Ok(());
    }
    let query = ConflictQuery {
        user_id: event.user_id,
        candidate: span,
        exclude_event_id: Some(event.id),
        scope: policy.scope.resolve(event.calendar_id),
    };
    let conflicts = find_conflicts_tx(tx, &query).await?;
    if !conflicts.is_empty() {
        let event_ids: Vec<Uuid> = conflicts.iter().map(|e| e.id).collect();
        warn!(?event_ids, %span, "event rejected: conflicts");
        return Err(AppError::Conflict { event_ids });
    }
    Ok(())
}

/// Creates an event. With conflict checking on, the check and the insert
/// share one transaction under the user lock.
#[instrument(skip_all, fields(%user_id, calendar_id = %input.calendar_id))]
pub async fn create_event(
    store: &dyn Store,
    user_id: Uuid,
    input: NewEvent,
    policy: ConflictPolicy,
) -> AppResult<Event> {
    let span = Interval::new(input.start_time, input.end_time)?;
    let title = check_title(&input.title)?;
    check_color(input.color.as_deref())?;

    let mut tx = store.begin().await?;
    if !tx.lock_user(user_id).await? {
        return Err(AppError::not_found("user", user_id));
    }
    if tx.find_calendar(input.calendar_id, user_id).await?.is_none() {
        return Err(AppError::not_found("calendar", input.calendar_id));
    }

    let now = OffsetDateTime::now_utc();
    let event = Event {
        id: Uuid::new_v4(),
        user_id,
        calendar_id: input.calendar_id,
        title,
        description: input.description,
        start_time: span.start(),
        end_time: span.end(),
        all_day: input.all_day,
        location: input.location,
        color: input.color,
        status: input.status,
        event_type: input.event_type,
        is_recurring: input.is_recurring,
        created_at: now,
        updated_at: now,
    };
    enforce_no_conflicts(&mut *tx, &event, span, policy).await?;

    tx.insert_event(&event).await?;
    tx.commit().await?;
    info!(event_id = %event.id, "event created");
    Ok(event)
}

#[instrument(skip_all, fields(%event_id, %user_id))]
pub async fn update_event(
    store: &dyn Store,
    event_id: Uuid,
    user_id: Uuid,
    patch: EventPatch,
    policy: ConflictPolicy,
) -> AppResult<Event> {
    let title = patch.title.as_deref().map(check_title).transpose()?;
    check_color(patch.color.as_deref())?;

    let mut tx = store.begin().await?;
    if !tx.lock_user(user_id).await? {
        return Err(AppError::not_found("user", user_id));
    }
    let mut event = tx
        .find_event(event_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("event", event_id))?;

    let span = Interval::new(
        patch.start_time.unwrap_or(event.start_time),
        patch.end_time.unwrap_or(event.end_time),
    )?;
    event.start_time = span.start();
    event.end_time = span.end();
    if let Some(title) = title {
        event.title = title;
    }
    if let Some(description) = patch.description {
        event.description = Some(description);
    }
    if let Some(all_day) = patch.all_day {
        event.all_day = all_day;
    }
    if let Some(location) = patch.location {
        event.location = Some(location);
    }
    if let Some(color) = patch.color {
        event.color = Some(color);
    }
    if let Some(status) = patch.status {
        event.status = status;
    }
    if let Some(event_type) = patch.event_type {
        event.event_type = event_type;
    }
    event.updated_at = OffsetDateTime::now_utc();

    enforce_no_conflicts(&mut *tx, &event, span, policy).await?;

    tx.update_event(&event).await?;
    tx.commit().await?;
    info!("event updated");
    Ok(event)
}

#[instrument(skip_all, fields(%event_id, %user_id))]
pub async fn get_event(store: &dyn Store, event_id: Uuid, user_id: Uuid) -> AppResult<Event> {
    let mut tx = store.begin().await?;
    let event = tx
        .find_event(event_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("event", event_id))?;
    tx.commit().await?;
    Ok(event)
}

#[instrument(skip_all, fields(%event_id, %user_id))]
pub async fn delete_event(store: &dyn Store, event_id: Uuid, user_id: Uuid) -> AppResult<()> {
    let mut tx = store.begin().await?;
    if !tx.delete_event(event_id, user_id).await? {
        return Err(AppError::not_found("event", event_id));
    }
    tx.commit().await?;
    info!("event deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::range::query_events_in_range;
    use crate::store::MemoryStore;
    use crate::test_support::{seed_calendar, seed_user};
    use time::macros::datetime;

    fn new_event(calendar_id: Uuid, start: OffsetDateTime, end: OffsetDateTime) -> NewEvent {
        NewEvent {
            calendar_id,
            title: "Design review".into(),
            description: None,
            start_time: start,
            end_time: end,
            all_day: false,
            location: None,
            color: None,
            status: EventStatus::Confirmed,
            event_type: EventType::Meeting,
            is_recurring: false,
        }
    }

    fn unchecked() -> ConflictPolicy {
        ConflictPolicy {
            check: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_length_event_is_rejected() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let at = datetime!(2024-05-01 09:00 UTC);
        let err = create_event(&store, user, new_event(cal, at, at), ConflictPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInterval(_)));
    }

    #[tokio::test]
    async fn same_slot_conflicts_only_when_checked() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let (s, e) = (datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC));
        let existing = create_event(&store, user, new_event(cal, s, e), ConflictPolicy::default())
            .await
            .unwrap();

        let err = create_event(&store, user, new_event(cal, s, e), ConflictPolicy::default())
            .await
            .unwrap_err();
        match err {
            AppError::Conflict { event_ids } => assert_eq!(event_ids, vec![existing.id]),
            other => panic!("expected conflict, got {other:?}"),
        }

        create_event(&store, user, new_event(cal, s, e), unchecked())
            .await
            .unwrap();
        let all = query_events_in_range(&store, user, None, s, e).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn touching_slot_is_bookable_but_reported_by_range() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();

        let (s, e) = (datetime!(2024-05-01 10:00 UTC), datetime!(2024-05-01 11:00 UTC));
        let reported = query_events_in_range(&store, user, None, s, e).await.unwrap();
        assert_eq!(reported.len(), 1);
        create_event(&store, user, new_event(cal, s, e), ConflictPolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_events_never_block() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let (s, e) = (datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC));
        let mut cancelled = new_event(cal, s, e);
        cancelled.status = EventStatus::Cancelled;
        create_event(&store, user, cancelled, ConflictPolicy::default())
            .await
            .unwrap();
        create_event(&store, user, new_event(cal, s, e), ConflictPolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_or_foreign_calendar_is_not_found() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let other = seed_user(&store).await;
        let theirs = seed_calendar(&store, other, "Theirs").await;
        let (s, e) = (datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC));
        let err = create_event(&store, user, new_event(theirs, s, e), ConflictPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "calendar", .. }));
    }

    #[tokio::test]
    async fn update_does_not_conflict_with_itself() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let ev = create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();

        let moved = update_event(
            &store,
            ev.id,
            user,
            EventPatch {
                end_time: Some(datetime!(2024-05-01 10:30 UTC)),
                title: Some("Longer review".into()),
                ..Default::default()
            },
            ConflictPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(moved.start_time, datetime!(2024-05-01 09:00 UTC));
        assert_eq!(moved.end_time, datetime!(2024-05-01 10:30 UTC));
        assert_eq!(moved.title, "Longer review");
    }

    #[tokio::test]
    async fn update_into_busy_slot_is_rejected_and_not_written() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let busy = create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();
        let ev = create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 11:00 UTC), datetime!(2024-05-01 12:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();

        let patch = EventPatch {
            start_time: Some(datetime!(2024-05-01 09:30 UTC)),
            ..Default::default()
        };
        let err = update_event(&store, ev.id, user, patch, ConflictPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { ref event_ids } if event_ids == &vec![busy.id]));

        let stored = get_event(&store, ev.id, user).await.unwrap();
        assert_eq!(stored.start_time, datetime!(2024-05-01 11:00 UTC));
    }

    #[tokio::test]
    async fn update_rejects_inverted_interval() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let ev = create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();
        let patch = EventPatch {
            start_time: Some(datetime!(2024-05-01 11:00 UTC)),
            ..Default::default()
        };
        let err = update_event(&store, ev.id, user, patch, unchecked())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInterval(_)));
    }

    #[tokio::test]
    async fn delete_and_missing_event() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let ev = create_event(
            &store,
            user,
            new_event(cal, datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC)),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();
        delete_event(&store, ev.id, user).await.unwrap();
        let err = get_event(&store, ev.id, user).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "event", .. }));
        let err = delete_event(&store, ev.id, user).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_bookings_of_one_slot_admit_one() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let (s, e) = (datetime!(2024-05-01 09:00 UTC), datetime!(2024-05-01 10:00 UTC));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let input = new_event(cal, s, e);
            handles.push(tokio::spawn(async move {
                create_event(&store, user, input, ConflictPolicy::default()).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }
}
