use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::{
    auth::repo_types::User,
    calendars::repo_types::Calendar,
    config::AppConfig,
    events::repo_types::Event,
    working_hours::repo_types::{WorkingHours, WorkingHoursRow},
};

const USER_COLUMNS: &str =
    "id, email, password_hash, role, name, avatar, timezone, created_at, updated_at";
const CALENDAR_COLUMNS: &str =
    "id, user_id, name, description, color, is_default, is_visible, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, user_id, calendar_id, title, description, start_time, end_time, \
     all_day, location, color, status, event_type, is_recurring, created_at, updated_at";
const WORKING_HOURS_COLUMNS: &str = "id, user_id, \
     monday_start, monday_end, tuesday_start, tuesday_end, wednesday_start, wednesday_end, \
     thursday_start, thursday_end, friday_start, friday_end, saturday_start, saturday_end, \
     sunday_start, sunday_end, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        info!("migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, name, avatar, timezone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.timezone)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.constraint().unwrap_or("users").to_string())
            }
            other => StoreError::Database(other),
        })?;
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn lock_user(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_calendar(&mut self, c: &Calendar) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO calendars (id, user_id, name, description, color, is_default, is_visible, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(c.id)
        .bind(c.user_id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(&c.color)
        .bind(c.is_default)
        .bind(c.is_visible)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_calendar(
        &mut self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Calendar>, StoreError> {
        let sql = format!("SELECT {CALENDAR_COLUMNS} FROM calendars WHERE id = $1 AND user_id = $2");
        let cal = sqlx::query_as::<_, Calendar>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(cal)
    }

    async fn list_calendars(&mut self, user_id: Uuid) -> Result<Vec<Calendar>, StoreError> {
        let sql = format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendars WHERE user_id = $1 ORDER BY name ASC, created_at ASC"
        );
        let rows = sqlx::query_as::<_, Calendar>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn count_calendars(&mut self, user_id: Uuid) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM calendars WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(n)
    }

    async fn find_default_calendar(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<Calendar>, StoreError> {
        let sql = format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendars WHERE user_id = $1 AND is_default LIMIT 1"
        );
        let cal = sqlx::query_as::<_, Calendar>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(cal)
    }

    async fn oldest_calendar(&mut self, user_id: Uuid) -> Result<Option<Calendar>, StoreError> {
        let sql = format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendars WHERE user_id = $1 ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        let cal = sqlx::query_as::<_, Calendar>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(cal)
    }

    async fn update_calendar(&mut self, c: &Calendar) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE calendars
               SET name = $3, description = $4, color = $5, is_visible = $6, updated_at = $7
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(c.id)
        .bind(c.user_id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(&c.color)
        .bind(c.is_visible)
        .bind(c.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn clear_default_calendars(&mut self, user_id: Uuid) -> Result<u64, StoreError> {
        let res = sqlx::query(
            "UPDATE calendars SET is_default = FALSE, updated_at = now() WHERE user_id = $1 AND is_default",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(res.rows_affected())
    }

    async fn mark_default_calendar(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE calendars SET is_default = TRUE, updated_at = now() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_calendar(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        // events go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM calendars WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn insert_event(&mut self, e: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (id, user_id, calendar_id, title, description, start_time, end_time,
                                all_day, location, color, status, event_type, is_recurring,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(e.id)
        .bind(e.user_id)
        .bind(e.calendar_id)
        .bind(&e.title)
        .bind(&e.description)
        .bind(e.start_time)
        .bind(e.end_time)
        .bind(e.all_day)
        .bind(&e.location)
        .bind(&e.color)
        .bind(e.status)
        .bind(e.event_type)
        .bind(e.is_recurring)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_event(&mut self, id: Uuid, user_id: Uuid) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 AND user_id = $2");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn update_event(&mut self, e: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE events
               SET title = $3, description = $4, start_time = $5, end_time = $6, all_day = $7,
                   location = $8, color = $9, status = $10, event_type = $11, updated_at = $12
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(e.id)
        .bind(e.user_id)
        .bind(&e.title)
        .bind(&e.description)
        .bind(e.start_time)
        .bind(e.end_time)
        .bind(e.all_day)
        .bind(&e.location)
        .bind(&e.color)
        .bind(e.status)
        .bind(e.event_type)
        .bind(e.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM events WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn events_in_range(
        &mut self,
        user_id: Uuid,
        calendar_ids: Option<&[Uuid]>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
              FROM events
             WHERE user_id = $1
               AND ($4::uuid[] IS NULL OR calendar_id = ANY($4))
               AND (   (start_time >= $2 AND start_time <= $3)
                    OR (end_time   >= $2 AND end_time   <= $3)
                    OR (start_time <= $2 AND end_time   >= $3))
             ORDER BY start_time ASC, seq ASC
            "#
        );
        let rows = sqlx::query_as::<_, Event>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .bind(calendar_ids.map(|ids| ids.to_vec()))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn find_working_hours(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<WorkingHours>, StoreError> {
        let sql = format!("SELECT {WORKING_HOURS_COLUMNS} FROM working_hours WHERE user_id = $1");
        let row = sqlx::query_as::<_, WorkingHoursRow>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(WorkingHours::try_from)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert_working_hours(&mut self, wh: &WorkingHours) -> Result<(), StoreError> {
        let [mon, tue, wed, thu, fri, sat, sun] = wh.schedule.columns();
        sqlx::query(
            r#"
            INSERT INTO working_hours (id, user_id,
                monday_start, monday_end, tuesday_start, tuesday_end,
                wednesday_start, wednesday_end, thursday_start, thursday_end,
                friday_start, friday_end, saturday_start, saturday_end,
                sunday_start, sunday_end, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(wh.id)
        .bind(wh.user_id)
        .bind(mon.0)
        .bind(mon.1)
        .bind(tue.0)
        .bind(tue.1)
        .bind(wed.0)
        .bind(wed.1)
        .bind(thu.0)
        .bind(thu.1)
        .bind(fri.0)
        .bind(fri.1)
        .bind(sat.0)
        .bind(sat.1)
        .bind(sun.0)
        .bind(sun.1)
        .bind(wh.created_at)
        .bind(wh.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_working_hours(&mut self, wh: &WorkingHours) -> Result<(), StoreError> {
        let [mon, tue, wed, thu, fri, sat, sun] = wh.schedule.columns();
        sqlx::query(
            r#"
            UPDATE working_hours
               SET monday_start = $2, monday_end = $3, tuesday_start = $4, tuesday_end = $5,
                   wednesday_start = $6, wednesday_end = $7, thursday_start = $8, thursday_end = $9,
                   friday_start = $10, friday_end = $11, saturday_start = $12, saturday_end = $13,
                   sunday_start = $14, sunday_end = $15, updated_at = $16
             WHERE user_id = $1
            "#,
        )
        .bind(wh.user_id)
        .bind(mon.0)
        .bind(mon.1)
        .bind(tue.0)
        .bind(tue.1)
        .bind(wed.0)
        .bind(wed.1)
        .bind(thu.0)
        .bind(thu.1)
        .bind(fri.0)
        .bind(fri.1)
        .bind(sat.0)
        .bind(sat.1)
        .bind(sun.0)
        .bind(sun.1)
        .bind(wh.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_working_hours(&mut self, user_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM working_hours WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// Need a live Postgres: `DATABASE_URL=postgres://… cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::repo_types::{EventStatus, EventType};
    use crate::test_support::{seed_calendar, seed_user};
    use time::macros::datetime;

    async fn book(
        store: &PgStore,
        user_id: Uuid,
        calendar_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Uuid {
        let event = Event {
            id: Uuid::new_v4(),
            user_id,
            calendar_id,
            title: "Busy".into(),
            description: None,
            start_time: start,
            end_time: end,
            all_day: false,
            location: None,
            color: None,
            status: EventStatus::Confirmed,
            event_type: EventType::Event,
            is_recurring: false,
            created_at: start,
            updated_at: start,
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_event(&event).await.unwrap();
        tx.commit().await.unwrap();
        event.id
    }

    async fn ids_in(
        store: &PgStore,
        user_id: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Vec<Uuid> {
        let mut tx = store.begin().await.unwrap();
        let events = tx.events_in_range(user_id, None, from, to).await.unwrap();
        events.into_iter().map(|e| e.id).collect()
    }

    #[sqlx::test]
    #[ignore]
    async fn range_sql_includes_touching_and_spanning_events(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let user = seed_user(&store).await;
        let cal = seed_calendar(&store, user, "Work").await;
        let day = |h: u8| datetime!(2024-05-01 00:00 UTC).replace_hour(h).unwrap();
        let all_day = book(&store, user, cal, day(8), day(18)).await;
        let morning = book(&store, user, cal, day(9), day(10)).await;
        let late = book(&store, user, cal, day(10), day(11)).await;
        let lunch = book(&store, user, cal, day(12), day(13)).await;

        let touching = ids_in(&store, user, day(10), day(10)).await;
        assert_eq!(touching, vec![all_day, morning, late]);

        let gap = ids_in(&store, user, day(11), day(12)).await;
        assert_eq!(gap, vec![all_day, late, lunch]);

        let next_day = datetime!(2024-05-02 00:00 UTC);
        let outside = ids_in(&store, user, next_day, next_day).await;
        assert!(outside.is_empty());
    }

    #[sqlx::test]
    #[ignore]
    async fn lock_user_and_email_constraint(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let user = seed_user(&store).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_user(user).await.unwrap());
        assert!(!tx.lock_user(Uuid::new_v4()).await.unwrap());

        let mut twin = tx.find_user(user).await.unwrap().unwrap();
        twin.id = Uuid::new_v4();
        let err = tx.insert_user(&twin).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }
}
