//! Reporting-window queries. Unlike conflict detection, both ends of the
//! window are inclusive: an event that merely touches the window is reported.

use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::repo_types::Event;
use crate::{
    error::{AppError, AppResult},
    store::Store,
};

/// `true` if `[start, end]` intersects the closed window `[from, to]`.
pub fn intersects_window(
    start: OffsetDateTime,
    end: OffsetDateTime,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> bool {
    let within = |t: OffsetDateTime| from <= t && t <= to;
    within(start) || within(end) || (start <= from && end >= to)
}

#[instrument(skip_all, fields(%user_id, %from, %to))]
pub async fn query_events_in_range(
    store: &dyn Store,
    user_id: Uuid,
    calendar_ids: Option<&[Uuid]>,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> AppResult<Vec<Event>> {
    if from > to {
        return Err(AppError::validation("range start must not be after range end"));
    }
    let mut tx = store.begin().await?;
    let events = tx.events_in_range(user_id, calendar_ids, from, to).await?;
    tx.commit().await?;
    debug!(count = events.len(), "range query");
    Ok(events)
}
