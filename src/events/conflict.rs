//! Booking conflict detection.
//!
//! A candidate conflicts with every non-cancelled event of the same user whose
//! interval strictly overlaps it. Back-to-back bookings are allowed.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::repo_types::Event;
use crate::{
    error::AppResult,
    interval::Interval,
    store::{Store, StoreTx},
};

/// Which of the user's events a candidate is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    AllCalendars,
    Calendar(Uuid),
}

/// Wire form of [`ConflictScope`]; `calendar` means the event's own calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    AllCalendars,
    Calendar,
}

impl ScopeMode {
    pub fn resolve(self, calendar_id: Uuid) -> ConflictScope {
        match self {
            ScopeMode::AllCalendars => ConflictScope::AllCalendars,
            ScopeMode::Calendar => ConflictScope::Calendar(calendar_id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictQuery {
    pub user_id: Uuid,
    pub candidate: Interval<OffsetDateTime>,
    pub exclude_event_id: Option<Uuid>,
    pub scope: ConflictScope,
}

/// Runs inside the caller's transaction so a following write sees the same
/// snapshot. The window scan is inclusive, hence a superset of the strict
/// overlaps; the strict predicate is applied here.
pub async fn find_conflicts_tx(
    tx: &mut dyn StoreTx,
    query: &ConflictQuery,
) -> AppResult<Vec<Event>> {
    let calendar_filter = match query.scope {
        ConflictScope::AllCalendars => None,
        ConflictScope::Calendar(id) => Some(vec![id]),
    };
    let candidates = tx
        .events_in_range(
            query.user_id,
            calendar_filter.as_deref(),
            query.candidate.start(),
            query.candidate.end(),
        )
        .await?;

    let conflicts: Vec<Event> = candidates
        .into_iter()
        .filter(|e| !e.is_cancelled())
        .filter(|e| Some(e.id) != query.exclude_event_id)
        .filter(|e| {
            e.span()
                .map(|span| span.overlaps(&query.candidate))
                .unwrap_or(false)
        })
        .collect();
    debug!(count = conflicts.len(), "conflict scan");
    Ok(conflicts)
}

/// Advisory check in its own transaction; a concurrent writer may still book
/// the slot afterwards. Writes use [`find_conflicts_tx`] under the user lock.
#[instrument(skip_all, fields(user_id = %query.user_id))]
pub async fn check_conflicts(store: &dyn Store, query: &ConflictQuery) -> AppResult<Vec<Event>> {
    let mut tx = store.begin().await?;
    let conflicts = find_conflicts_tx(&mut *tx, query).await?;
    tx.commit().await?;
    Ok(conflicts)
}
