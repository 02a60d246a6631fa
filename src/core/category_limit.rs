//! Category-limit accounting - monthly caps per spending category.
//!
//! A limit row covers one calendar month, identified by its `reset_date` (the first
//! day of the following month). Transaction creation, update and deletion move the
//! row's `spent` total through [`record_spend`] and [`reverse_spend`], always inside
//! the caller's database transaction. The monthly job zeroes every row with
//! [`reset_category_limits`].

use crate::{
    core::calendar::first_of_next_month,
    entities::{CategoryLimit, category_limit},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Share of the cap above which a category is flagged as a warning.
const WARNING_PERCENTAGE: f64 = 80.0;

/// How close a category is to its cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitStatus {
    /// Comfortably under the cap
    Ok,
    /// More than 80 % used
    Warning,
    /// Spent more than the cap
    Over,
}

/// Derived spending status for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatus {
    /// Category label
    pub category: String,
    /// Spent in the current window
    pub spent: f64,
    /// Monthly cap
    pub monthly_limit: f64,
    /// `max(0, monthly_limit - spent)`
    pub remaining: f64,
    /// `min(100, spent / monthly_limit * 100)`, or 0 without a cap
    pub percentage_used: f64,
    /// Over / warning / ok classification
    pub status: LimitStatus,
}

impl From<&category_limit::Model> for CategoryStatus {
    fn from(limit: &category_limit::Model) -> Self {
        let percentage_used = limit.percentage_used();
        let status = if limit.spent > limit.monthly_limit {
            LimitStatus::Over
        } else if percentage_used > WARNING_PERCENTAGE {
            LimitStatus::Warning
        } else {
            LimitStatus::Ok
        };
        Self {
            category: limit.category.clone(),
            spent: limit.spent,
            monthly_limit: limit.monthly_limit,
            remaining: limit.remaining(),
            percentage_used,
            status,
        }
    }
}

fn validate_limit(monthly_limit: f64) -> Result<()> {
    if !monthly_limit.is_finite() || monthly_limit < 0.0 {
        return Err(Error::InvalidAmount {
            amount: monthly_limit,
        });
    }
    Ok(())
}

/// Creates the limit for `category` in the month containing `today`, or updates the
/// cap if one already exists. `spent` is left untouched on update.
pub async fn set_limit(
    db: &DatabaseConnection,
    user_id: i64,
    category: String,
    monthly_limit: f64,
    today: NaiveDate,
) -> Result<category_limit::Model> {
    validate_limit(monthly_limit)?;
    let category = category.trim().to_string();
    if category.is_empty() {
        return Err(Error::invalid_state("Category cannot be empty"));
    }

    let reset_date = first_of_next_month(today);
    let existing = CategoryLimit::find()
        .filter(category_limit::Column::UserId.eq(user_id))
        .filter(category_limit::Column::Category.eq(category.as_str()))
        .filter(category_limit::Column::ResetDate.eq(reset_date))
        .one(db)
        .await?;

    if let Some(limit) = existing {
        let mut active_model: category_limit::ActiveModel = limit.into();
        active_model.monthly_limit = Set(monthly_limit);
        return active_model.update(db).await.map_err(Into::into);
    }

    let limit = category_limit::ActiveModel {
        user_id: Set(user_id),
        category: Set(category),
        monthly_limit: Set(monthly_limit),
        spent: Set(0.0),
        reset_date: Set(reset_date),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    limit.insert(db).await.map_err(Into::into)
}

/// Lists the user's limits for the month containing `today`, alphabetically.
pub async fn list_current_limits(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<category_limit::Model>> {
    CategoryLimit::find()
        .filter(category_limit::Column::UserId.eq(user_id))
        .filter(category_limit::Column::ResetDate.eq(first_of_next_month(today)))
        .order_by_asc(category_limit::Column::Category)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the current month's limit for one category.
pub async fn get_current_limit(
    db: &DatabaseConnection,
    user_id: i64,
    category: &str,
    today: NaiveDate,
) -> Result<category_limit::Model> {
    CategoryLimit::find()
        .filter(category_limit::Column::UserId.eq(user_id))
        .filter(category_limit::Column::Category.eq(category))
        .filter(category_limit::Column::ResetDate.eq(first_of_next_month(today)))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Category limit", category))
}

/// Spending status for every category limited this month.
pub async fn category_status(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<CategoryStatus>> {
    let limits = list_current_limits(db, user_id, today).await?;
    Ok(limits.iter().map(CategoryStatus::from).collect())
}

async fn find_owned_limit<C>(db: &C, user_id: i64, limit_id: i64) -> Result<category_limit::Model>
where
    C: ConnectionTrait,
{
    CategoryLimit::find_by_id(limit_id)
        .filter(category_limit::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Category limit", limit_id))
}

/// Changes the cap of an existing limit.
pub async fn update_limit(
    db: &DatabaseConnection,
    user_id: i64,
    limit_id: i64,
    monthly_limit: f64,
) -> Result<category_limit::Model> {
    validate_limit(monthly_limit)?;
    let limit = find_owned_limit(db, user_id, limit_id).await?;
    let mut active_model: category_limit::ActiveModel = limit.into();
    active_model.monthly_limit = Set(monthly_limit);
    active_model.update(db).await.map_err(Into::into)
}

/// Deletes a limit. Transactions already counted against it are unaffected.
pub async fn delete_limit(db: &DatabaseConnection, user_id: i64, limit_id: i64) -> Result<()> {
    let limit = find_owned_limit(db, user_id, limit_id).await?;
    limit.delete(db).await?;
    Ok(())
}

async fn find_window_limit<C>(
    db: &C,
    user_id: i64,
    category: &str,
    spent_at: DateTime<Utc>,
) -> Result<Option<category_limit::Model>>
where
    C: ConnectionTrait,
{
    CategoryLimit::find()
        .filter(category_limit::Column::UserId.eq(user_id))
        .filter(category_limit::Column::Category.eq(category))
        .filter(category_limit::Column::ResetDate.eq(first_of_next_month(spent_at.date_naive())))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds `amount` to the limit covering `spent_at`, if the user has one for `category`.
///
/// Performs `UPDATE category_limits SET spent = spent + amount` so concurrent
/// writers do not lose updates.
pub async fn record_spend<C>(
    db: &C,
    user_id: i64,
    category: &str,
    spent_at: DateTime<Utc>,
    amount: f64,
) -> Result<Option<category_limit::Model>>
where
    C: ConnectionTrait,
{
    let Some(limit) = find_window_limit(db, user_id, category, spent_at).await? else {
        return Ok(None);
    };

    CategoryLimit::update_many()
        .col_expr(
            category_limit::Column::Spent,
            Expr::col(category_limit::Column::Spent).add(amount),
        )
        .filter(category_limit::Column::Id.eq(limit.id))
        .exec(db)
        .await?;
    debug!("Category {} spent +{:.2} for user {}", category, amount, user_id);

    CategoryLimit::find_by_id(limit.id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Removes `amount` from the limit covering `spent_at`, never going below zero.
pub async fn reverse_spend<C>(
    db: &C,
    user_id: i64,
    category: &str,
    spent_at: DateTime<Utc>,
    amount: f64,
) -> Result<Option<category_limit::Model>>
where
    C: ConnectionTrait,
{
    let Some(limit) = find_window_limit(db, user_id, category, spent_at).await? else {
        return Ok(None);
    };

    let new_spent = (limit.spent - amount).max(0.0);
    let mut active_model: category_limit::ActiveModel = limit.into();
    active_model.spent = Set(new_spent);
    let updated = active_model.update(db).await?;
    debug!("Category {} spent -{:.2} for user {}", category, amount, user_id);
    Ok(Some(updated))
}

/// Zeroes `spent` on every limit and moves `reset_date` to the first day of the
/// month after `today`, on any connection.
///
/// A stale row whose (user, category) already has a row for the new window is
/// dropped instead of moved, keeping one row per window.
pub async fn reset_limits<C>(db: &C, today: NaiveDate) -> Result<u64>
where
    C: ConnectionTrait,
{
    let next_reset = first_of_next_month(today);
    let current: HashSet<(i64, String)> = CategoryLimit::find()
        .filter(category_limit::Column::ResetDate.eq(next_reset))
        .all(db)
        .await?
        .into_iter()
        .map(|limit| (limit.user_id, limit.category))
        .collect();

    let stale = CategoryLimit::find()
        .filter(category_limit::Column::ResetDate.ne(next_reset))
        .all(db)
        .await?;
    let mut dropped = 0;
    for limit in stale {
        if current.contains(&(limit.user_id, limit.category.clone())) {
            limit.delete(db).await?;
            dropped += 1;
        }
    }

    let result = CategoryLimit::update_many()
        .col_expr(category_limit::Column::Spent, Expr::value(0.0))
        .col_expr(category_limit::Column::ResetDate, Expr::value(next_reset))
        .exec(db)
        .await?;

    info!(
        "Reset {} category limits ({} superseded rows dropped), next reset on {}",
        result.rows_affected, dropped, next_reset
    );
    Ok(result.rows_affected)
}

/// Resets every category limit in one database transaction. All rows change or
/// none do.
///
/// Returns the number of limits reset.
pub async fn reset_category_limits(db: &DatabaseConnection, today: NaiveDate) -> Result<u64> {
    let txn = db.begin().await?;
    let reset = reset_limits(&txn, today).await?;
    txn.commit().await?;
    Ok(reset)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::transaction::{TransactionChanges, delete_transaction, update_transaction};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_spend_and_reverse_follow_transactions() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;

        let txn = create_test_transaction(&db, user.id, "Food", 75.0).await?;

        let limit = get_current_limit(&db, user.id, "Food", today).await?;
        assert_eq!(limit.spent, 75.0);
        assert_eq!(limit.remaining(), 125.0);
        assert_eq!(limit.percentage_used(), 37.5);

        delete_transaction(&db, user.id, txn.id).await?;
        let limit = get_current_limit(&db, user.id, "Food", today).await?;
        assert_eq!(limit.spent, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_categories_untouched() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;

        create_test_transaction(&db, user.id, "Transport", 40.0).await?;

        let limit = get_current_limit(&db, user.id, "Food", today).await?;
        assert_eq!(limit.spent, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_spend_floors_at_zero() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let now = Utc::now();
        let txn = create_test_transaction(&db, user.id, "Fun", 30.0).await?;
        // Limit created after the transaction, so it never counted it
        set_limit(&db, user.id, "Fun".to_string(), 100.0, now.date_naive()).await?;

        delete_transaction(&db, user.id, txn.id).await?;
        let limit = get_current_limit(&db, user.id, "Fun", now.date_naive()).await?;
        assert_eq!(limit.spent, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_moves_spend_between_categories() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;
        set_limit(&db, user.id, "Fun".to_string(), 100.0, today).await?;

        let txn = create_test_transaction(&db, user.id, "Food", 50.0).await?;
        update_transaction(
            &db,
            user.id,
            txn.id,
            TransactionChanges {
                amount: Some(60.0),
                category: Some("Fun".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(get_current_limit(&db, user.id, "Food", today).await?.spent, 0.0);
        assert_eq!(get_current_limit(&db, user.id, "Fun", today).await?.spent, 60.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_in_same_window_moves_only_the_difference() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        let uncounted = create_test_transaction(&db, user.id, "Food", 50.0).await?;
        set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;
        let counted = create_test_transaction(&db, user.id, "Food", 30.0).await?;
        assert_eq!(get_current_limit(&db, user.id, "Food", today).await?.spent, 30.0);

        let note_only = TransactionChanges {
            note: Some("Groceries".to_string()),
            ..Default::default()
        };
        update_transaction(&db, user.id, uncounted.id, note_only).await?;
        let impulse_only = TransactionChanges {
            is_impulse: Some(true),
            ..Default::default()
        };
        update_transaction(&db, user.id, counted.id, impulse_only).await?;
        assert_eq!(get_current_limit(&db, user.id, "Food", today).await?.spent, 30.0);

        let raise = TransactionChanges {
            amount: Some(45.0),
            ..Default::default()
        };
        update_transaction(&db, user.id, counted.id, raise).await?;
        assert_eq!(get_current_limit(&db, user.id, "Food", today).await?.spent, 45.0);

        let lower = TransactionChanges {
            amount: Some(20.0),
            ..Default::default()
        };
        update_transaction(&db, user.id, counted.id, lower).await?;
        assert_eq!(get_current_limit(&db, user.id, "Food", today).await?.spent, 20.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_limit_upserts_current_window() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        let first = set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;
        assert_eq!(first.reset_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        let second = set_limit(&db, user.id, "Food".to_string(), 250.0, today).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(second.monthly_limit, 250.0);
        assert_eq!(list_current_limits(&db, user.id, today).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_category_status_classification() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        set_limit(&db, user.id, "Food".to_string(), 100.0, today).await?;
        set_limit(&db, user.id, "Fun".to_string(), 100.0, today).await?;
        set_limit(&db, user.id, "Rent".to_string(), 100.0, today).await?;

        create_test_transaction(&db, user.id, "Food", 20.0).await?;
        create_test_transaction(&db, user.id, "Fun", 85.0).await?;
        create_test_transaction(&db, user.id, "Rent", 120.0).await?;

        let status = category_status(&db, user.id, today).await?;
        assert_eq!(status.len(), 3);
        assert_eq!(status[0].status, LimitStatus::Ok);
        assert_eq!(status[1].status, LimitStatus::Warning);
        assert_eq!(status[2].status, LimitStatus::Over);
        assert_eq!(status[2].percentage_used, 100.0);
        assert_eq!(status[2].remaining, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_cap_has_zero_percentage() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        let limit = set_limit(&db, user.id, "Gifts".to_string(), 0.0, today).await?;
        assert_eq!(limit.percentage_used(), 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_zeroes_all_limits() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;
        set_limit(&db, user.id, "Fun".to_string(), 50.0, today).await?;
        create_test_transaction(&db, user.id, "Food", 75.0).await?;
        create_test_transaction(&db, user.id, "Fun", 80.0).await?;

        let next_month = first_of_next_month(today);
        let reset = reset_category_limits(&db, next_month).await?;
        assert_eq!(reset, 2);

        let limits = CategoryLimit::find().all(&db).await?;
        for limit in limits {
            assert_eq!(limit.spent, 0.0);
            assert_eq!(limit.reset_date, first_of_next_month(next_month));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_limits_are_private() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let other = create_test_user(&db, "other").await?;
        let today = Utc::now().date_naive();
        let limit = set_limit(&db, user.id, "Food".to_string(), 200.0, today).await?;

        let result = update_limit(&db, other.id, limit.id, 10.0).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        let result = delete_limit(&db, other.id, limit.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        delete_limit(&db, user.id, limit.id).await?;
        assert!(list_current_limits(&db, user.id, today).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_limit_rejected() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let today = Utc::now().date_naive();
        let result = set_limit(&db, user.id, "Food".to_string(), -1.0, today).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        let result = set_limit(&db, user.id, "  ".to_string(), 10.0, today).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));
        Ok(())
    }
}
