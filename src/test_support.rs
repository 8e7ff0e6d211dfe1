//! Fixtures shared by the unit tests.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{User, UserRole},
    calendars::repo_types::{Calendar, DEFAULT_COLOR},
    store::Store,
};

pub async fn seed_user(store: &dyn Store) -> Uuid {
    let now = OffsetDateTime::now_utc();
    let id = Uuid::new_v4();
    let user = User {
        id,
        email: format!("{id}@example.com"),
        password_hash: "not-a-hash".into(),
        role: UserRole::User,
        name: "Test User".into(),
        avatar: None,
        timezone: "UTC".into(),
        created_at: now,
        updated_at: now,
    };
    let mut tx = store.begin().await.unwrap();
    tx.insert_user(&user).await.unwrap();
    tx.commit().await.unwrap();
    id
}

/// Inserts a non-default calendar directly, bypassing the creation policy.
pub async fn seed_calendar(store: &dyn Store, user_id: Uuid, name: &str) -> Uuid {
    let now = OffsetDateTime::now_utc();
    let calendar = Calendar {
        id: Uuid::new_v4(),
        user_id,
        name: name.into(),
        description: None,
        color: DEFAULT_COLOR.into(),
        is_default: false,
        is_visible: true,
        created_at: now,
        updated_at: now,
    };
    let mut tx = store.begin().await.unwrap();
    tx.insert_calendar(&calendar).await.unwrap();
    tx.commit().await.unwrap();
    calendar.id
}
