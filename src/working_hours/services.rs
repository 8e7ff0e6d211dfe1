use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo_types::WorkingHours;
use super::schedule::{SchedulePatch, WeeklySchedule};
use crate::{
    error::{AppError, AppResult},
    store::Store,
};

/// Stores the user's template. A user has at most one.
#[instrument(skip_all, fields(%user_id))]
pub async fn create_working_hours(
    store: &dyn Store,
    user_id: Uuid,
    schedule: WeeklySchedule,
) -> AppResult<WorkingHours> {
    let mut tx = store.begin().await?;
    if !tx.lock_user(user_id).await? {
        return Err(AppError::not_found("user", user_id));
    }
    if tx.find_working_hours(user_id).await?.is_some() {
        return Err(AppError::validation(
            "working hours already exist for this user; update them instead",
        ));
    }
    let now = OffsetDateTime::now_utc();
    let hours = WorkingHours {
        id: Uuid::new_v4(),
        user_id,
        schedule,
        created_at: now,
        updated_at: now,
    };
    tx.insert_working_hours(&hours).await?;
    tx.commit().await?;
    info!(days = schedule.working_days(), "working hours created");
    Ok(hours)
}

#[instrument(skip_all, fields(%user_id))]
pub async fn get_working_hours(
    store: &dyn Store,
    user_id: Uuid,
) -> AppResult<Option<WorkingHours>> {
    let mut tx = store.begin().await?;
    let hours = tx.find_working_hours(user_id).await?;
    tx.commit().await?;
    Ok(hours)
}

/// Merges `patch` into the stored template; days the patch does not mention
/// keep their value.
#[instrument(skip_all, fields(%user_id))]
pub async fn update_working_hours(
    store: &dyn Store,
    user_id: Uuid,
    patch: SchedulePatch,
) -> AppResult<WorkingHours> {
    let mut tx = store.begin().await?;
    if !tx.lock_user(user_id).await? {
        return Err(AppError::not_found("user", user_id));
    }
    let mut hours = tx
        .find_working_hours(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("working hours", user_id))?;
    if patch.is_empty() {
        return Ok(hours);
    }
    hours.schedule.apply(&patch);
    hours.updated_at = OffsetDateTime::now_utc();
    tx.update_working_hours(&hours).await?;
    tx.commit().await?;
    info!(days = hours.schedule.working_days(), "working hours updated");
    Ok(hours)
}

#[instrument(skip_all, fields(%user_id))]
pub async fn delete_working_hours(store: &dyn Store, user_id: Uuid) -> AppResult<()> {
    let mut tx = store.begin().await?;
    if !tx.delete_working_hours(user_id).await? {
        return Err(AppError::not_found("working hours", user_id));
    }
    tx.commit().await?;
    info!("working hours deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::seed_user;
    use crate::working_hours::schedule::parse_day_hours;
    use time::Weekday;

    fn nine_to_five() -> WeeklySchedule {
        WeeklySchedule::default()
            .with(Weekday::Monday, parse_day_hours("09:00", "17:00").unwrap())
            .with(Weekday::Tuesday, parse_day_hours("09:00", "17:00").unwrap())
    }

    #[tokio::test]
    async fn patching_one_day_leaves_the_rest() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        create_working_hours(&store, user, nine_to_five()).await.unwrap();

        let mut patch = SchedulePatch::default();
        patch.replace(Weekday::Tuesday, parse_day_hours("10:00", "16:00").unwrap());
        let updated = update_working_hours(&store, user, patch).await.unwrap();

        assert_eq!(
            updated.schedule.get(Weekday::Monday),
            Some(parse_day_hours("09:00", "17:00").unwrap())
        );
        assert_eq!(
            updated.schedule.get(Weekday::Tuesday),
            Some(parse_day_hours("10:00", "16:00").unwrap())
        );
        assert_eq!(get_working_hours(&store, user).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn clearing_a_day_removes_it() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        create_working_hours(&store, user, nine_to_five()).await.unwrap();

        let mut patch = SchedulePatch::default();
        patch.clear(Weekday::Monday);
        let updated = update_working_hours(&store, user, patch).await.unwrap();
        assert_eq!(updated.schedule.get(Weekday::Monday), None);
        assert_eq!(updated.schedule.working_days(), 1);
    }

    #[tokio::test]
    async fn second_template_is_rejected() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        create_working_hours(&store, user, nine_to_five()).await.unwrap();
        let err = create_working_hours(&store, user, WeeklySchedule::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_template_and_unknown_user() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        let err = update_working_hours(&store, user, SchedulePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "working hours", .. }));

        let err = create_working_hours(&store, Uuid::new_v4(), nine_to_five())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn delete_removes_template() {
        let store = MemoryStore::new();
        let user = seed_user(&store).await;
        create_working_hours(&store, user, nine_to_five()).await.unwrap();
        delete_working_hours(&store, user).await.unwrap();
        assert_eq!(get_working_hours(&store, user).await.unwrap(), None);
        assert!(delete_working_hours(&store, user).await.is_err());
    }
}
