//! User business logic - account records and the financial settings behind the daily limit.
//!
//! Authentication is handled elsewhere; these functions only manage the stored profile.
//! Deleting a user removes every row the user owns inside one database transaction.

use crate::{
    core::streak::max_rollover,
    entities::{
        AvoidedImpulse, BudgetRollover, CategoryLimit, Celebration, Goal, Income, Reflection,
        Transaction, User, UserStreak, WishlistItem, avoided_impulse, budget_rollover,
        category_limit, celebration, goal, income, reflection, transaction, user, user_streak,
        wishlist_item,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

fn validate_financials(monthly_income: f64, fixed_expenses: f64) -> Result<()> {
    for amount in [monthly_income, fixed_expenses] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::InvalidAmount { amount });
        }
    }
    Ok(())
}

/// Creates a new user with the given financial settings.
///
/// The timezone defaults to `"UTC"`.
pub async fn create_user(
    db: &DatabaseConnection,
    name: String,
    email: String,
    monthly_income: f64,
    fixed_expenses: f64,
    timezone: Option<String>,
) -> Result<user::Model> {
    if name.trim().is_empty() {
        return Err(Error::invalid_state("User name cannot be empty"));
    }
    if email.trim().is_empty() {
        return Err(Error::invalid_state("User e-mail cannot be empty"));
    }
    validate_financials(monthly_income, fixed_expenses)?;

    let user = user::ActiveModel {
        name: Set(name.trim().to_string()),
        email: Set(email.trim().to_lowercase()),
        monthly_income: Set(monthly_income),
        fixed_expenses: Set(fixed_expenses),
        timezone: Set(timezone.unwrap_or_else(|| "UTC".to_string())),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = user.insert(db).await?;
    info!("Created user {} ({})", result.id, result.email);
    Ok(result)
}

/// Looks a user up by id on any connection or open transaction.
pub async fn find_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}

/// Retrieves a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    find_user(db, user_id).await
}

/// Retrieves a user by e-mail address, case-insensitively.
pub async fn get_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists every user, oldest first. This is the roster the nightly jobs iterate.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    User::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates income, fixed expenses and optionally the timezone.
///
/// A rollover budget above the new daily limit's cap is trimmed to the cap.
pub async fn update_financials(
    db: &DatabaseConnection,
    user_id: i64,
    monthly_income: f64,
    fixed_expenses: f64,
    timezone: Option<String>,
) -> Result<user::Model> {
    validate_financials(monthly_income, fixed_expenses)?;
    let txn = db.begin().await?;
    let user = find_user(&txn, user_id).await?;

    let mut active_model: user::ActiveModel = user.into();
    active_model.monthly_income = Set(monthly_income);
    active_model.fixed_expenses = Set(fixed_expenses);
    if let Some(timezone) = timezone {
        active_model.timezone = Set(timezone);
    }
    let updated = active_model.update(&txn).await?;

    let cap = max_rollover(updated.daily_limit());
    let streak = UserStreak::find()
        .filter(user_streak::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;
    if let Some(streak) = streak.filter(|s| s.rollover_budget > cap) {
        info!(
            "Trimming rollover budget of user {} from {:.2} to {:.2}",
            user_id, streak.rollover_budget, cap
        );
        let mut active_streak: user_streak::ActiveModel = streak.into();
        active_streak.rollover_budget = Set(cap);
        active_streak.updated_at = Set(chrono::Utc::now());
        active_streak.update(&txn).await?;
    }

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a user together with every record the user owns.
pub async fn delete_user(db: &DatabaseConnection, user_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let user = find_user(&txn, user_id).await?;

    Transaction::delete_many()
        .filter(transaction::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Income::delete_many()
        .filter(income::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    CategoryLimit::delete_many()
        .filter(category_limit::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Goal::delete_many()
        .filter(goal::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    WishlistItem::delete_many()
        .filter(wishlist_item::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    UserStreak::delete_many()
        .filter(user_streak::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    BudgetRollover::delete_many()
        .filter(budget_rollover::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Reflection::delete_many()
        .filter(reflection::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    AvoidedImpulse::delete_many()
        .filter(avoided_impulse::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Celebration::delete_many()
        .filter(celebration::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    user.delete(&txn).await?;
    txn.commit().await?;

    info!("Deleted user {} and all owned records", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_user_defaults() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_user(
            &db,
            " Dana ".to_string(),
            "Dana@Example.com".to_string(),
            3000.0,
            1500.0,
            None,
        )
        .await?;

        assert_eq!(user.name, "Dana");
        assert_eq!(user.email, "dana@example.com");
        assert_eq!(user.timezone, "UTC");
        assert_eq!(user.daily_limit(), 50.0);

        let found = get_user_by_email(&db, "DANA@example.com").await?;
        assert_eq!(found.map(|u| u.id), Some(user.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_user_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_user(&db, String::new(), "a@b.c".to_string(), 1.0, 0.0, None).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let result =
            create_user(&db, "A".to_string(), "a@b.c".to_string(), -1.0, 0.0, None).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = create_user(
            &db,
            "A".to_string(),
            "a@b.c".to_string(),
            100.0,
            f64::NAN,
            None,
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_financials_changes_daily_limit() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "ana").await?;

        let updated =
            update_financials(&db, user.id, 4500.0, 1500.0, Some("Europe/Rome".to_string()))
                .await?;
        assert_eq!(updated.daily_limit(), 100.0);
        assert_eq!(updated.timezone, "Europe/Rome");
        Ok(())
    }

    #[tokio::test]
    async fn test_lower_limit_trims_rollover_budget() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "saver").await?;
        let streak = crate::core::streak::get_or_create_streak(&db, user.id).await?;
        let mut active_streak: user_streak::ActiveModel = streak.into();
        active_streak.rollover_budget = Set(150.0);
        active_streak.update(&db).await?;

        // Daily limit drops from 50 to 20, so the cap drops to 60
        update_financials(&db, user.id, 2100.0, 1500.0, None).await?;
        let streak = crate::core::streak::get_streak(&db, user.id).await?;
        assert_eq!(streak.rollover_budget, 60.0);

        // Raising the limit never adds budget
        update_financials(&db, user.id, 6000.0, 1500.0, None).await?;
        let streak = crate::core::streak::get_streak(&db, user.id).await?;
        assert_eq!(streak.rollover_budget, 60.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_user() -> Result<()> {
        let db = setup_test_db().await?;
        let result = get_user(&db, 99).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "User", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_cascades() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "gone").await?;
        let keeper = create_test_user(&db, "stays").await?;

        create_test_transaction(&db, user.id, "Food", 12.0).await?;
        create_test_transaction(&db, keeper.id, "Food", 7.0).await?;
        crate::core::goal::create_goal(
            &db,
            user.id,
            crate::core::goal::NewGoal::new("Trip", 500.0),
        )
        .await?;
        crate::core::streak::record_impulse_avoided(&db, user.id).await?;

        delete_user(&db, user.id).await?;

        assert!(User::find_by_id(user.id).one(&db).await?.is_none());
        let remaining = Transaction::find().all(&db).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, keeper.id);
        assert_eq!(Goal::find().count(&db).await?, 0);
        assert_eq!(UserStreak::find().count(&db).await?, 0);
        Ok(())
    }
}
