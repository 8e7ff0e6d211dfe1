use std::collections::BTreeMap;

use serde::Deserialize;
use time::Weekday;

use super::schedule::{parse_day_hours, parse_weekday, DayHours, SchedulePatch, WeeklySchedule};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct DayHoursInput {
    pub start: String,
    pub end: String,
}

impl DayHoursInput {
    fn parse(&self) -> AppResult<DayHours> {
        Ok(parse_day_hours(&self.start, &self.end)?)
    }
}

fn weekday(name: &str) -> AppResult<Weekday> {
    parse_weekday(name).ok_or_else(|| AppError::validation(format!("unknown weekday: {name}")))
}

/// `{"monday": {"start": "09:00", "end": "17:00"}, …}`; missing days are off.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct CreateWorkingHoursRequest(pub BTreeMap<String, DayHoursInput>);

impl TryFrom<CreateWorkingHoursRequest> for WeeklySchedule {
    type Error = AppError;

    fn try_from(r: CreateWorkingHoursRequest) -> AppResult<Self> {
        let mut schedule = WeeklySchedule::default();
        for (name, hours) in &r.0 {
            schedule.set(weekday(name)?, Some(hours.parse()?));
        }
        Ok(schedule)
    }
}

/// Absent day: unchanged. `null`: cleared. Object: replaced.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct UpdateWorkingHoursRequest(pub BTreeMap<String, Option<DayHoursInput>>);

impl TryFrom<UpdateWorkingHoursRequest> for SchedulePatch {
    type Error = AppError;

    fn try_from(r: UpdateWorkingHoursRequest) -> AppResult<Self> {
        let mut patch = SchedulePatch::default();
        for (name, change) in &r.0 {
            let day = weekday(name)?;
            match change {
                Some(hours) => patch.replace(day, hours.parse()?),
                None => patch.clear(day),
            }
        }
        Ok(patch)
    }
}
