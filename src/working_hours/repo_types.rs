use serde::Serialize;
use sqlx::FromRow;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

use super::schedule::{day_from_columns, WeeklySchedule, WEEK};
use crate::interval::InvalidInterval;

/// One working-hours template per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingHours {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule: WeeklySchedule,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Flat storage layout: a nullable start/end column pair per weekday.
#[derive(Debug, FromRow)]
pub struct WorkingHoursRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub monday_start: Option<Time>,
    pub monday_end: Option<Time>,
    pub tuesday_start: Option<Time>,
    pub tuesday_end: Option<Time>,
    pub wednesday_start: Option<Time>,
    pub wednesday_end: Option<Time>,
    pub thursday_start: Option<Time>,
    pub thursday_end: Option<Time>,
    pub friday_start: Option<Time>,
    pub friday_end: Option<Time>,
    pub saturday_start: Option<Time>,
    pub saturday_end: Option<Time>,
    pub sunday_start: Option<Time>,
    pub sunday_end: Option<Time>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<WorkingHoursRow> for WorkingHours {
    type Error = InvalidInterval;

    fn try_from(r: WorkingHoursRow) -> Result<Self, Self::Error> {
        let columns = [
            (r.monday_start, r.monday_end),
            (r.tuesday_start, r.tuesday_end),
            (r.wednesday_start, r.wednesday_end),
            (r.thursday_start, r.thursday_end),
            (r.friday_start, r.friday_end),
            (r.saturday_start, r.saturday_end),
            (r.sunday_start, r.sunday_end),
        ];
        let mut schedule = WeeklySchedule::default();
        for ((day, _), (start, end)) in WEEK.iter().zip(columns) {
            schedule.set(*day, day_from_columns(start, end)?);
        }
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            schedule,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, time};
    use time::Weekday;

    fn empty_row() -> WorkingHoursRow {
        WorkingHoursRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            monday_start: None,
            monday_end: None,
            tuesday_start: None,
            tuesday_end: None,
            wednesday_start: None,
            wednesday_end: None,
            thursday_start: None,
            thursday_end: None,
            friday_start: None,
            friday_end: None,
            saturday_start: None,
            saturday_end: None,
            sunday_start: None,
            sunday_end: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn row_keeps_only_complete_days() {
        let row = WorkingHoursRow {
            monday_start: Some(time!(9:00)),
            monday_end: Some(time!(17:00)),
            tuesday_start: Some(time!(9:00)),
            sunday_end: Some(time!(12:00)),
            ..empty_row()
        };
        let wh = WorkingHours::try_from(row).unwrap();
        assert!(wh.schedule.get(Weekday::Monday).is_some());
        assert!(wh.schedule.get(Weekday::Tuesday).is_none());
        assert!(wh.schedule.get(Weekday::Sunday).is_none());
        assert_eq!(wh.schedule.working_days(), 1);
    }

    #[test]
    fn row_with_inverted_day_is_rejected() {
        let row = WorkingHoursRow {
            friday_start: Some(time!(18:00)),
            friday_end: Some(time!(8:00)),
            ..empty_row()
        };
        assert!(WorkingHours::try_from(row).is_err());
    }
}
