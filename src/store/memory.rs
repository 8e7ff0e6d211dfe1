//! Process-local store. A transaction takes the store-wide lock, works on a
//! private copy of the tables and writes it back on commit, so transactions
//! are fully serialized and a dropped transaction leaves no trace.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::{
    auth::repo_types::User, calendars::repo_types::Calendar, events::range::intersects_window,
    events::repo_types::Event, working_hours::repo_types::WorkingHours,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    calendars: Vec<Calendar>,
    // insertion order doubles as the range-query tie breaker
    events: Vec<Event>,
    working_hours: Vec<WorkingHours>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

impl MemoryTx {
    fn calendar_mut(&mut self, id: Uuid, user_id: Uuid) -> Option<&mut Calendar> {
        self.work
            .calendars
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self.work.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users.email".into()));
        }
        self.work.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.work.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.work.users.iter().find(|u| u.email == email).cloned())
    }

    async fn lock_user(&mut self, id: Uuid) -> Result<bool, StoreError> {
        // the store-wide lock is already held
        Ok(self.work.users.iter().any(|u| u.id == id))
    }

    async fn insert_calendar(&mut self, calendar: &Calendar) -> Result<(), StoreError> {
        self.work.calendars.push(calendar.clone());
        Ok(())
    }

    async fn find_calendar(
        &mut self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Calendar>, StoreError> {
        Ok(self.calendar_mut(id, user_id).map(|c| c.clone()))
    }

    async fn list_calendars(&mut self, user_id: Uuid) -> Result<Vec<Calendar>, StoreError> {
        let mut out: Vec<Calendar> = self
            .work
            .calendars
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn count_calendars(&mut self, user_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .work
            .calendars
            .iter()
            .filter(|c| c.user_id == user_id)
            .count() as i64)
    }

    async fn find_default_calendar(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<Calendar>, StoreError> {
        Ok(self
            .work
            .calendars
            .iter()
            .find(|c| c.user_id == user_id && c.is_default)
            .cloned())
    }

    async fn oldest_calendar(&mut self, user_id: Uuid) -> Result<Option<Calendar>, StoreError> {
        Ok(self
            .work
            .calendars
            .iter()
            .filter(|c| c.user_id == user_id)
            .min_by_key(|c| c.created_at)
            .cloned())
    }

    async fn update_calendar(&mut self, calendar: &Calendar) -> Result<(), StoreError> {
        if let Some(c) = self.calendar_mut(calendar.id, calendar.user_id) {
            *c = calendar.clone();
        }
        Ok(())
    }

    async fn clear_default_calendars(&mut self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut n = 0;
        for c in self
            .work
            .calendars
            .iter_mut()
            .filter(|c| c.user_id == user_id && c.is_default)
        {
            c.is_default = false;
            c.updated_at = now;
            n += 1;
        }
        Ok(n)
    }

    async fn mark_default_calendar(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        match self.calendar_mut(id, user_id) {
            Some(c) => {
                c.is_default = true;
                c.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_calendar(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let before = self.work.calendars.len();
        self.work
            .calendars
            .retain(|c| !(c.id == id && c.user_id == user_id));
        let removed = self.work.calendars.len() != before;
        if removed {
            self.work.events.retain(|e| e.calendar_id != id);
        }
        Ok(removed)
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        self.work.events.push(event.clone());
        Ok(())
    }

    async fn find_event(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self
            .work
            .events
            .iter()
            .find(|e| e.id == id && e.user_id == user_id)
            .cloned())
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        if let Some(e) = self
            .work
            .events
            .iter_mut()
            .find(|e| e.id == event.id && e.user_id == event.user_id)
        {
            *e = event.clone();
        }
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let before = self.work.events.len();
        self.work
            .events
            .retain(|e| !(e.id == id && e.user_id == user_id));
        Ok(self.work.events.len() != before)
    }

    async fn events_in_range(
        &mut self,
        user_id: Uuid,
        calendar_ids: Option<&[Uuid]>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError> {
        let mut out: Vec<Event> = self
            .work
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| calendar_ids.map_or(true, |ids| ids.contains(&e.calendar_id)))
            .filter(|e| intersects_window(e.start_time, e.end_time, start, end))
            .cloned()
            .collect();
        // stable: equal start times keep insertion order
        out.sort_by_key(|e| e.start_time);
        Ok(out)
    }

    async fn find_working_hours(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<WorkingHours>, StoreError> {
        Ok(self
            .work
            .working_hours
            .iter()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn insert_working_hours(&mut self, hours: &WorkingHours) -> Result<(), StoreError> {
        self.work.working_hours.push(hours.clone());
        Ok(())
    }

    async fn update_working_hours(&mut self, hours: &WorkingHours) -> Result<(), StoreError> {
        if let Some(w) = self
            .work
            .working_hours
            .iter_mut()
            .find(|w| w.user_id == hours.user_id)
        {
            *w = hours.clone();
        }
        Ok(())
    }

    async fn delete_working_hours(&mut self, user_id: Uuid) -> Result<bool, StoreError> {
        let before = self.work.working_hours.len();
        self.work.working_hours.retain(|w| w.user_id != user_id);
        Ok(self.work.working_hours.len() != before)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
