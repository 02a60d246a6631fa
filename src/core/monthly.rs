//! Monthly maintenance
//!
//! Resets category-limit spending at the start of each month. The date of the last
//! reset is kept in the `system_state` table so the reset applies at most once per
//! calendar month, however often the job is triggered.

use crate::{
    core::category_limit::reset_limits,
    entities::{SystemState, system_state},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

const LAST_CATEGORY_RESET_KEY: &str = "last_category_reset";

/// Result of a monthly reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyResetResult {
    /// Number of category limits zeroed
    pub limits_reset: u64,
    /// Day the reset ran for
    pub reset_date: NaiveDate,
}

/// Checks whether the reset for the month containing `today` is still outstanding.
pub async fn is_monthly_reset_needed<C>(db: &C, today: NaiveDate) -> Result<bool>
where
    C: ConnectionTrait,
{
    let last_reset = get_last_reset_date(db).await?;
    Ok(last_reset.is_none_or(|last| last.year() != today.year() || last.month() != today.month()))
}

/// Retrieves the date of the last category reset from the `system_state` table.
///
/// # Returns
/// * `Ok(Some(date))` - Last reset date if it exists
/// * `Ok(None)` - No reset recorded yet
pub async fn get_last_reset_date<C>(db: &C) -> Result<Option<NaiveDate>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_CATEGORY_RESET_KEY))
        .one(db)
        .await?;

    match state {
        Some(s) => NaiveDate::parse_from_str(&s.value, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::Config {
                message: format!("Failed to parse last category reset date: {e}"),
            }),
        None => Ok(None),
    }
}

async fn set_last_reset_date<C>(db: &C, date: NaiveDate) -> Result<()>
where
    C: ConnectionTrait,
{
    let date_str = date.format("%Y-%m-%d").to_string();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_CATEGORY_RESET_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(date_str);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_CATEGORY_RESET_KEY.to_string()),
            value: Set(date_str),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Resets every category limit once per calendar month.
///
/// The reset and the bookkeeping row are written in one database transaction.
///
/// # Returns
/// * `Ok(Some(result))` - The reset ran
/// * `Ok(None)` - Already reset this month
pub async fn process_monthly_reset(
    db: &DatabaseConnection,
    today: NaiveDate,
) -> Result<Option<MonthlyResetResult>> {
    let txn = db.begin().await?;

    if !is_monthly_reset_needed(&txn, today).await? {
        return Ok(None);
    }

    let limits_reset = reset_limits(&txn, today).await?;
    set_last_reset_date(&txn, today).await?;
    txn.commit().await?;

    info!(
        "Monthly reset for {} cleared {} category limits",
        today.format("%B %Y"),
        limits_reset
    );
    Ok(Some(MonthlyResetResult {
        limits_reset,
        reset_date: today,
    }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::category_limit::{get_current_limit, set_limit},
        test_utils::*,
    };
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_reset_needed_without_history() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(is_monthly_reset_needed(&db, date(2024, 1, 1)).await?);
        assert!(get_last_reset_date(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_last_reset_date_updates_existing() -> Result<()> {
        let db = setup_test_db().await?;
        set_last_reset_date(&db, date(2024, 1, 1)).await?;
        set_last_reset_date(&db, date(2024, 2, 1)).await?;

        assert_eq!(get_last_reset_date(&db).await?, Some(date(2024, 2, 1)));
        let count = SystemState::find()
            .filter(system_state::Column::Key.eq(LAST_CATEGORY_RESET_KEY))
            .count(&db)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_process_monthly_reset_runs_once_per_month() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        set_limit(&db, user.id, "Food".to_string(), 200.0, date(2024, 4, 10)).await?;
        create_dated_transaction(
            &db,
            user.id,
            75.0,
            Utc.with_ymd_and_hms(2024, 4, 12, 9, 0, 0).unwrap(),
        )
        .await?;
        let before = get_current_limit(&db, user.id, "Food", date(2024, 4, 12)).await?;
        assert_eq!(before.spent, 75.0);

        let may_first = date(2024, 5, 1);
        let result = process_monthly_reset(&db, may_first).await?.unwrap();
        assert_eq!(result.limits_reset, 1);

        let limit = get_current_limit(&db, user.id, "Food", may_first).await?;
        assert_eq!(limit.spent, 0.0);
        assert_eq!(limit.reset_date, date(2024, 6, 1));

        assert!(process_monthly_reset(&db, date(2024, 5, 20)).await?.is_none());
        assert!(process_monthly_reset(&db, date(2024, 6, 1)).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_drops_superseded_window() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        set_limit(&db, user.id, "Food".to_string(), 200.0, date(2024, 4, 10)).await?;
        set_limit(&db, user.id, "Food".to_string(), 300.0, date(2024, 5, 1)).await?;

        process_monthly_reset(&db, date(2024, 5, 1)).await?;

        let limit = get_current_limit(&db, user.id, "Food", date(2024, 5, 2)).await?;
        assert_eq!(limit.monthly_limit, 300.0);
        assert_eq!(
            crate::entities::CategoryLimit::find().count(&db).await?,
            1
        );
        Ok(())
    }
}
