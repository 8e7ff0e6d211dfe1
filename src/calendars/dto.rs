use serde::Deserialize;

use super::services::{CalendarPatch, NewCalendar};

#[derive(Debug, Deserialize)]
pub struct CreateCalendarRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl From<CreateCalendarRequest> for NewCalendar {
    fn from(r: CreateCalendarRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            color: r.color,
            is_default: r.is_default,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCalendarRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_visible: Option<bool>,
}

impl From<UpdateCalendarRequest> for CalendarPatch {
    fn from(r: UpdateCalendarRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            color: r.color,
            is_visible: r.is_visible,
        }
    }
}
