//! Daily reflections - at most one per user and day.
//!
//! The uniqueness rule is checked before insert and backed by a unique index on
//! `(user_id, date)`.

use crate::{
    core::user::{find_user, list_users},
    entities::{Reflection, reflection, user},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, SqlErr, prelude::*};
use std::collections::HashSet;

/// Largest page [`list_reflections`] returns.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Reflection text; every field is optional
#[derive(Debug, Clone, Default)]
pub struct ReflectionInput {
    /// A purchase the user regrets
    pub regret_purchase: Option<String>,
    /// A purchase the user is happy with
    pub good_purchase: Option<String>,
    /// Anything else
    pub notes: Option<String>,
}

fn duplicate(date: NaiveDate) -> Error {
    Error::invalid_state(format!("Reflection already exists for {date}"))
}

/// Stores the user's reflection for `date`.
///
/// Fails with `InvalidState` if one already exists for that day.
pub async fn create_reflection(
    db: &DatabaseConnection,
    user_id: i64,
    date: NaiveDate,
    input: ReflectionInput,
) -> Result<reflection::Model> {
    find_user(db, user_id).await?;
    if get_for_date(db, user_id, date).await?.is_some() {
        return Err(duplicate(date));
    }

    let result = reflection::ActiveModel {
        user_id: Set(user_id),
        date: Set(date),
        regret_purchase: Set(input.regret_purchase),
        good_purchase: Set(input.good_purchase),
        notes: Set(input.notes),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match result {
        Ok(model) => Ok(model),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(duplicate(date))
        }
        Err(e) => Err(e.into()),
    }
}

/// The user's reflection for `date`, if any.
pub async fn get_for_date(
    db: &DatabaseConnection,
    user_id: i64,
    date: NaiveDate,
) -> Result<Option<reflection::Model>> {
    Reflection::find()
        .filter(reflection::Column::UserId.eq(user_id))
        .filter(reflection::Column::Date.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Whether the user already reflected on `date`.
pub async fn has_reflected(db: &DatabaseConnection, user_id: i64, date: NaiveDate) -> Result<bool> {
    Ok(get_for_date(db, user_id, date).await?.is_some())
}

/// Retrieves one reflection by id.
pub async fn get_reflection(
    db: &DatabaseConnection,
    user_id: i64,
    reflection_id: i64,
) -> Result<reflection::Model> {
    Reflection::find_by_id(reflection_id)
        .filter(reflection::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Reflection", reflection_id))
}

/// Lists reflections, most recent day first.
pub async fn list_reflections(
    db: &DatabaseConnection,
    user_id: i64,
    offset: u64,
    limit: u64,
) -> Result<Vec<reflection::Model>> {
    Reflection::find()
        .filter(reflection::Column::UserId.eq(user_id))
        .order_by_desc(reflection::Column::Date)
        .offset(offset)
        .limit(limit.clamp(1, MAX_PAGE_SIZE))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces the text of an existing reflection. The date never changes.
pub async fn update_reflection(
    db: &DatabaseConnection,
    user_id: i64,
    reflection_id: i64,
    input: ReflectionInput,
) -> Result<reflection::Model> {
    let reflection = get_reflection(db, user_id, reflection_id).await?;
    let mut active_model: reflection::ActiveModel = reflection.into();
    active_model.regret_purchase = Set(input.regret_purchase);
    active_model.good_purchase = Set(input.good_purchase);
    active_model.notes = Set(input.notes);
    active_model.update(db).await.map_err(Into::into)
}

/// Deletes a reflection.
pub async fn delete_reflection(
    db: &DatabaseConnection,
    user_id: i64,
    reflection_id: i64,
) -> Result<()> {
    let reflection = get_reflection(db, user_id, reflection_id).await?;
    reflection.delete(db).await?;
    Ok(())
}

/// Users who have not reflected on `date`; the evening reminder's audience.
pub async fn users_without_reflection(
    db: &DatabaseConnection,
    date: NaiveDate,
) -> Result<Vec<user::Model>> {
    let reflected: HashSet<i64> = Reflection::find()
        .filter(reflection::Column::Date.eq(date))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.user_id)
        .collect();

    Ok(list_users(db)
        .await?
        .into_iter()
        .filter(|u| !reflected.contains(&u.id))
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn input(notes: &str) -> ReflectionInput {
        ReflectionInput {
            notes: Some(notes.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_one_reflection_per_day() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_reflection(&db, user.id, day(1), input("Good day")).await?;

        let result = create_reflection(&db, user.id, day(1), input("Again")).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        create_reflection(&db, user.id, day(2), input("Next day")).await?;
        assert_eq!(list_reflections(&db, user.id, 0, 30).await?.len(), 2);
        assert!(has_reflected(&db, user.id, day(1)).await?);
        assert!(!has_reflected(&db, user.id, day(3)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_backs_the_rule() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_reflection(&db, user.id, day(1), input("First")).await?;

        let raw = reflection::ActiveModel {
            user_id: Set(user.id),
            date: Set(day(1)),
            regret_purchase: Set(None),
            good_purchase: Set(None),
            notes: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await;
        assert!(raw.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_reflection() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let created = create_reflection(&db, user.id, day(4), input("Draft")).await?;

        let updated = update_reflection(
            &db,
            user.id,
            created.id,
            ReflectionInput {
                regret_purchase: Some("Late-night snacks".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.date, day(4));
        assert_eq!(updated.regret_purchase.as_deref(), Some("Late-night snacks"));
        assert!(updated.notes.is_none());

        delete_reflection(&db, user.id, created.id).await?;
        assert!(get_for_date(&db, user.id, day(4)).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_users_without_reflection() -> Result<()> {
        let db = setup_test_db().await?;
        let diligent = create_test_user(&db, "diligent").await?;
        let forgetful = create_test_user(&db, "forgetful").await?;
        create_reflection(&db, diligent.id, day(9), input("Done")).await?;

        let missing = users_without_reflection(&db, day(9)).await?;
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, forgetful.id);
        assert_eq!(users_without_reflection(&db, day(10)).await?.len(), 2);
        Ok(())
    }
}
