//! Persistence gateway. Services open one [`StoreTx`] per operation; a
//! transaction dropped without [`StoreTx::commit`] is rolled back.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::User, calendars::repo_types::Calendar, events::repo_types::Event,
    working_hours::repo_types::WorkingHours,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// Operations available inside one transaction. Every lookup that takes a
/// `user_id` only sees rows owned by that user.
#[async_trait]
pub trait StoreTx: Send {
    /// Fails with [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    /// Serializes this transaction against every other one holding the same
    /// user's lock. Returns false for an unknown user.
    async fn lock_user(&mut self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_calendar(&mut self, calendar: &Calendar) -> Result<(), StoreError>;
    async fn find_calendar(&mut self, id: Uuid, user_id: Uuid)
        -> Result<Option<Calendar>, StoreError>;
    /// Ordered by name.
    async fn list_calendars(&mut self, user_id: Uuid) -> Result<Vec<Calendar>, StoreError>;
    async fn count_calendars(&mut self, user_id: Uuid) -> Result<i64, StoreError>;
    async fn find_default_calendar(&mut self, user_id: Uuid)
        -> Result<Option<Calendar>, StoreError>;
    async fn oldest_calendar(&mut self, user_id: Uuid) -> Result<Option<Calendar>, StoreError>;
    async fn update_calendar(&mut self, calendar: &Calendar) -> Result<(), StoreError>;
    async fn clear_default_calendars(&mut self, user_id: Uuid) -> Result<u64, StoreError>;
    /// Returns false when `id` is not one of the user's calendars.
    async fn mark_default_calendar(&mut self, id: Uuid, user_id: Uuid)
        -> Result<bool, StoreError>;
    /// Removes the calendar together with its events.
    async fn delete_calendar(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError>;
    async fn find_event(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Event>, StoreError>;
    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError>;
    async fn delete_event(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    /// Boundary-inclusive window scan (see `events::range::intersects_window`),
    /// ordered by start time then insertion order.
    async fn events_in_range(
        &mut self,
        user_id: Uuid,
        calendar_ids: Option<&[Uuid]>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError>;

    async fn find_working_hours(&mut self, user_id: Uuid)
        -> Result<Option<WorkingHours>, StoreError>;
    async fn insert_working_hours(&mut self, hours: &WorkingHours) -> Result<(), StoreError>;
    async fn update_working_hours(&mut self, hours: &WorkingHours) -> Result<(), StoreError>;
    async fn delete_working_hours(&mut self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
