//! Weekly working-hours template: each weekday maps to an optional
//! time-of-day interval.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Time, Weekday};

use crate::interval::{Interval, InvalidInterval};

pub type DayHours = Interval<Time>;

const HHMM: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

/// Weekdays in storage/column order.
pub const WEEK: [(Weekday, &str); 7] = [
    (Weekday::Monday, "monday"),
    (Weekday::Tuesday, "tuesday"),
    (Weekday::Wednesday, "wednesday"),
    (Weekday::Thursday, "thursday"),
    (Weekday::Friday, "friday"),
    (Weekday::Saturday, "saturday"),
    (Weekday::Sunday, "sunday"),
];

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let name = name.trim().to_ascii_lowercase();
    WEEK.iter().find(|(_, n)| *n == name).map(|(d, _)| *d)
}

/// Parses an `"HH:MM"` pair into a validated interval.
pub fn parse_day_hours(start: &str, end: &str) -> Result<DayHours, InvalidInterval> {
    let parse = |s: &str| Time::parse(s.trim(), HHMM);
    match (parse(start), parse(end)) {
        (Ok(s), Ok(e)) => Interval::new(s, e),
        _ => Err(InvalidInterval::malformed(start, end)),
    }
}

/// Interval from raw column values; a day counts only when both ends are set.
pub fn day_from_columns(
    start: Option<Time>,
    end: Option<Time>,
) -> Result<Option<DayHours>, InvalidInterval> {
    match (start, end) {
        (Some(s), Some(e)) => Interval::new(s, e).map(Some),
        _ => Ok(None),
    }
}

fn slot(day: Weekday) -> usize {
    day.number_days_from_monday() as usize
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [Option<DayHours>; 7],
}

impl WeeklySchedule {
    pub fn get(&self, day: Weekday) -> Option<DayHours> {
        self.days[slot(day)]
    }

    pub fn set(&mut self, day: Weekday, hours: Option<DayHours>) {
        self.days[slot(day)] = hours;
    }

    pub fn with(mut self, day: Weekday, hours: DayHours) -> Self {
        self.set(day, Some(hours));
        self
    }

    /// `(start, end)` column pairs, Monday first.
    pub fn columns(&self) -> [(Option<Time>, Option<Time>); 7] {
        self.days
            .map(|d| (d.map(|h| h.start()), d.map(|h| h.end())))
    }

    /// Field-level merge: only days mentioned by the patch change.
    pub fn apply(&mut self, patch: &SchedulePatch) {
        for (i, change) in patch.days.iter().enumerate() {
            if let Some(hours) = change {
                self.days[i] = *hours;
            }
        }
    }

    pub fn working_days(&self) -> usize {
        self.days.iter().filter(|d| d.is_some()).count()
    }
}

/// Per-day tri-state: untouched, cleared, or replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    days: [Option<Option<DayHours>>; 7],
}

impl SchedulePatch {
    pub fn replace(&mut self, day: Weekday, hours: DayHours) {
        self.days[slot(day)] = Some(Some(hours));
    }

    pub fn clear(&mut self, day: Weekday) {
        self.days[slot(day)] = Some(None);
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Option::is_none)
    }
}

struct HoursOut(DayHours);

impl Serialize for HoursOut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fmt = |t: Time| -> Result<String, S::Error> {
            t.format(HHMM).map_err(serde::ser::Error::custom)
        };
        let mut s = serializer.serialize_struct("DayHours", 2)?;
        s.serialize_field("start", &fmt(self.0.start())?)?;
        s.serialize_field("end", &fmt(self.0.end())?)?;
        s.end()
    }
}

// Absent days are omitted from the output map.
impl Serialize for WeeklySchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.working_days()))?;
        for (day, name) in WEEK {
            if let Some(hours) = self.get(day) {
                map.serialize_entry(name, &HoursOut(hours))?;
            }
        }
        map.end()
    }
}
