use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::conflict::ScopeMode;
use super::repo_types::{Event, EventStatus, EventType};
use super::services::{ConflictPolicy, EventPatch, NewEvent};
use crate::error::{AppError, AppResult};

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default = "yes")]
    pub check_conflicts: bool,
    #[serde(default)]
    pub conflict_scope: ScopeMode,
}

impl CreateEventRequest {
    pub fn into_parts(self) -> (NewEvent, ConflictPolicy) {
        let policy = ConflictPolicy {
            check: self.check_conflicts,
            scope: self.conflict_scope,
        };
        let event = NewEvent {
            calendar_id: self.calendar_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            all_day: self.all_day,
            location: self.location,
            color: self.color,
            status: self.status,
            event_type: self.event_type,
            is_recurring: self.is_recurring,
        };
        (event, policy)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub all_day: Option<bool>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
    #[serde(default = "yes")]
    pub check_conflicts: bool,
    #[serde(default)]
    pub conflict_scope: ScopeMode,
}

impl UpdateEventRequest {
    pub fn into_parts(self) -> (EventPatch, ConflictPolicy) {
        let policy = ConflictPolicy {
            check: self.check_conflicts,
            scope: self.conflict_scope,
        };
        let patch = EventPatch {
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            all_day: self.all_day,
            location: self.location,
            color: self.color,
            status: self.status,
            event_type: self.event_type,
        };
        (patch, policy)
    }
}

/// `GET /events?start=…&end=…&calendar_ids=a,b`
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub calendar_ids: Option<String>,
}

impl RangeQuery {
    /// `None` means every calendar of the user; so does an empty list.
    pub fn calendar_ids(&self) -> AppResult<Option<Vec<Uuid>>> {
        let Some(raw) = self.calendar_ids.as_deref() else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|_| AppError::validation(format!("invalid calendar id: {s}")))
            })
            .collect::<AppResult<Vec<_>>>()
            .map(|ids| (!ids.is_empty()).then_some(ids))
    }
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub exclude_event_id: Option<Uuid>,
    /// Limits the check to one calendar; all calendars otherwise.
    pub calendar_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConflictCheckResponse {
    pub has_conflicts: bool,
    pub conflicts: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(ids: Option<&str>) -> RangeQuery {
        RangeQuery {
            start: OffsetDateTime::UNIX_EPOCH,
            end: OffsetDateTime::UNIX_EPOCH,
            calendar_ids: ids.map(str::to_string),
        }
    }

    #[test]
    fn calendar_ids_are_comma_separated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = query(Some(&format!("{a}, {b},"))).calendar_ids().unwrap();
        assert_eq!(ids, Some(vec![a, b]));
        assert_eq!(query(None).calendar_ids().unwrap(), None);
        assert!(query(Some("nope")).calendar_ids().is_err());
    }

    #[test]
    fn empty_calendar_ids_mean_all_calendars() {
        assert_eq!(query(Some("")).calendar_ids().unwrap(), None);
        assert_eq!(query(Some(" , ")).calendar_ids().unwrap(), None);
    }

    #[test]
    fn create_request_defaults_to_checking_all_calendars() {
        let body = serde_json::json!({
            "calendar_id": Uuid::new_v4(),
            "title": "Standup",
            "start_time": "2024-05-01T09:00:00Z",
            "end_time": "2024-05-01T09:15:00Z",
        });
        let req: CreateEventRequest = serde_json::from_value(body).unwrap();
        let (event, policy) = req.into_parts();
        assert!(policy.check);
        assert_eq!(policy.scope, ScopeMode::AllCalendars);
        assert_eq!(event.status, EventStatus::Confirmed);
    }

    #[test]
    fn update_request_accepts_partial_body() {
        let body = serde_json::json!({
            "end_time": "2024-05-01T10:30:00+02:00",
            "check_conflicts": false,
            "conflict_scope": "calendar",
        });
        let req: UpdateEventRequest = serde_json::from_value(body).unwrap();
        let (patch, policy) = req.into_parts();
        assert!(patch.start_time.is_none());
        assert!(patch.end_time.is_some());
        assert!(!policy.check);
        assert_eq!(policy.scope, ScopeMode::Calendar);
    }
}
