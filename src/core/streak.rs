//! Streak engine.
//!
//! [`evaluate_day`] is the pure daily rule: given yesterday's streak state, the
//! user's daily limit and what was spent on the evaluated day, it returns the new
//! state. Persistence and batch iteration live in [`crate::core::rollover`].

use crate::{
    core::milestone,
    entities::{Transaction, UserStreak, transaction, user_streak},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::debug;

/// Rollover is capped at this many daily limits.
pub const ROLLOVER_CAP_DAYS: f64 = 3.0;

/// The part of a streak row the daily rule reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StreakState {
    /// Consecutive days at or under the daily limit
    pub current_streak: i32,
    /// High-water mark of `current_streak`
    pub longest_streak: i32,
    /// Accumulated unused budget
    pub rollover_budget: f64,
}

impl From<&user_streak::Model> for StreakState {
    fn from(model: &user_streak::Model) -> Self {
        Self {
            current_streak: model.current_streak,
            longest_streak: model.longest_streak,
            rollover_budget: model.rollover_budget,
        }
    }
}

/// Result of applying the daily rule to one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayOutcome {
    /// Amount spent on the day
    pub spent: f64,
    /// Daily limit the day was judged against
    pub daily_limit: f64,
    /// `max(0, daily_limit - spent)`
    pub unused: f64,
    /// `spent <= daily_limit`
    pub under_budget: bool,
    /// Portion of `unused` actually added to the rollover budget
    pub rollover_applied: f64,
    /// State after the day
    pub state: StreakState,
}

impl DayOutcome {
    /// Whether the day produces a rollover ledger row.
    #[must_use]
    pub fn has_ledger_entry(&self) -> bool {
        self.unused > 0.0
    }
}

/// Largest rollover budget allowed for a daily limit.
#[must_use]
pub fn max_rollover(daily_limit: f64) -> f64 {
    daily_limit.max(0.0) * ROLLOVER_CAP_DAYS
}

/// Applies one evaluated day to the streak state.
///
/// An over-budget day resets the streak to zero. Unused budget is added to the
/// rollover up to the cap; a budget already above the cap is left as it is.
#[must_use]
pub fn evaluate_day(state: StreakState, daily_limit: f64, spent: f64) -> DayOutcome {
    let unused = (daily_limit - spent).max(0.0);
    let under_budget = spent <= daily_limit;

    let mut next = state;
    if under_budget {
        next.current_streak = state.current_streak.saturating_add(1);
        next.longest_streak = state.longest_streak.max(next.current_streak);
    } else {
        next.current_streak = 0;
    }

    let mut rollover_applied = 0.0;
    if unused > 0.0 {
        let capped = (state.rollover_budget + unused).min(max_rollover(daily_limit));
        if capped > state.rollover_budget {
            rollover_applied = capped - state.rollover_budget;
            next.rollover_budget = capped;
        }
    }

    DayOutcome {
        spent,
        daily_limit,
        unused,
        under_budget,
        rollover_applied,
        state: next,
    }
}

/// Returns the user's streak row, creating a zeroed one if none exists.
pub async fn get_or_create_streak<C>(db: &C, user_id: i64) -> Result<user_streak::Model>
where
    C: ConnectionTrait,
{
    if let Some(streak) = UserStreak::find()
        .filter(user_streak::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(streak);
    }

    debug!("Creating streak record for user {}", user_id);
    let streak = user_streak::ActiveModel {
        user_id: Set(user_id),
        current_streak: Set(0),
        longest_streak: Set(0),
        impulses_avoided: Set(0),
        rollover_budget: Set(0.0),
        last_streak_date: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    streak.insert(db).await.map_err(Into::into)
}

/// Reads the user's streak row (created on first access).
pub async fn get_streak(db: &DatabaseConnection, user_id: i64) -> Result<user_streak::Model> {
    crate::core::user::find_user(db, user_id).await?;
    get_or_create_streak(db, user_id).await
}

/// Changes the avoided-impulse counter by `delta`, never going below zero,
/// and records any milestone the new count reaches.
pub async fn adjust_impulses_avoided<C>(
    db: &C,
    user_id: i64,
    delta: i32,
) -> Result<user_streak::Model>
where
    C: ConnectionTrait,
{
    let streak = get_or_create_streak(db, user_id).await?;
    let count = streak.impulses_avoided.saturating_add(delta).max(0);

    let mut active_model: user_streak::ActiveModel = streak.into();
    active_model.impulses_avoided = Set(count);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;

    milestone::record_new_milestones(db, &updated).await?;
    Ok(updated)
}

/// Increments the avoided-impulse counter without storing an impulse record.
pub async fn record_impulse_avoided(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<user_streak::Model> {
    let txn = db.begin().await?;
    crate::core::user::find_user(&txn, user_id).await?;
    let updated = adjust_impulses_avoided(&txn, user_id, 1).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Sets the current streak back to zero. The longest streak is kept.
pub async fn reset_streak(db: &DatabaseConnection, user_id: i64) -> Result<user_streak::Model> {
    let streak = UserStreak::find()
        .filter(user_streak::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Streak", user_id))?;

    let mut active_model: user_streak::ActiveModel = streak.into();
    active_model.current_streak = Set(0);
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Which milestones the user has reached, with the values behind them
#[derive(Debug, Clone, Serialize)]
pub struct MilestoneStatus {
    /// Current streak of at least seven days
    pub streak_7_days: bool,
    /// Current streak of at least thirty days
    pub streak_30_days: bool,
    /// Rollover savings of at least 100
    pub savings_100: bool,
    /// Rollover savings of at least 500
    pub savings_500: bool,
    /// At least five impulses avoided
    pub impulses_5: bool,
    /// At least twenty impulses avoided
    pub impulses_20: bool,
    /// Current streak
    pub current_streak: i32,
    /// Longest streak
    pub longest_streak: i32,
    /// Rollover budget
    pub total_savings: f64,
    /// Impulses avoided
    pub impulses_avoided: i32,
    /// Impulse transactions actually made
    pub impulse_purchases: u64,
}

/// Milestone flags for the user's current streak row.
pub async fn milestone_status(db: &DatabaseConnection, user_id: i64) -> Result<MilestoneStatus> {
    use crate::entities::Milestone;

    let streak = get_streak(db, user_id).await?;
    let impulse_purchases = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::IsImpulse.eq(true))
        .count(db)
        .await?;

    Ok(MilestoneStatus {
        streak_7_days: milestone::is_reached(Milestone::Streak7, &streak),
        streak_30_days: milestone::is_reached(Milestone::Streak30, &streak),
        savings_100: milestone::is_reached(Milestone::Saved100, &streak),
        savings_500: milestone::is_reached(Milestone::Saved500, &streak),
        impulses_5: milestone::is_reached(Milestone::Impulses5, &streak),
        impulses_20: milestone::is_reached(Milestone::Impulses20, &streak),
        current_streak: streak.current_streak,
        longest_streak: streak.longest_streak,
        total_savings: streak.rollover_budget,
        impulses_avoided: streak.impulses_avoided,
        impulse_purchases,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_under_budget_day_extends_streak() {
        let outcome = evaluate_day(StreakState::default(), 50.0, 20.0);
        assert!(outcome.under_budget);
        assert_eq!(outcome.unused, 30.0);
        assert_eq!(outcome.rollover_applied, 30.0);
        assert_eq!(outcome.state.current_streak, 1);
        assert_eq!(outcome.state.longest_streak, 1);
        assert_eq!(outcome.state.rollover_budget, 30.0);
        assert!(outcome.has_ledger_entry());
    }

    #[test]
    fn test_spending_exactly_the_limit_counts_as_under_budget() {
        let outcome = evaluate_day(StreakState::default(), 50.0, 50.0);
        assert!(outcome.under_budget);
        assert_eq!(outcome.unused, 0.0);
        assert_eq!(outcome.state.current_streak, 1);
        assert!(!outcome.has_ledger_entry());
    }

    #[test]
    fn test_over_budget_day_resets_streak_but_keeps_longest() {
        let state = StreakState {
            current_streak: 5,
            longest_streak: 9,
            rollover_budget: 40.0,
        };
        let outcome = evaluate_day(state, 50.0, 80.0);
        assert!(!outcome.under_budget);
        assert_eq!(outcome.unused, 0.0);
        assert_eq!(outcome.state.current_streak, 0);
        assert_eq!(outcome.state.longest_streak, 9);
        assert_eq!(outcome.state.rollover_budget, 40.0);
    }

    #[test]
    fn test_rollover_is_capped_at_three_daily_limits() {
        let state = StreakState {
            current_streak: 2,
            longest_streak: 2,
            rollover_budget: 130.0,
        };
        let outcome = evaluate_day(state, 50.0, 0.0);
        assert_eq!(outcome.unused, 50.0);
        assert_eq!(outcome.rollover_applied, 20.0);
        assert_eq!(outcome.state.rollover_budget, 150.0);
    }

    #[test]
    fn test_budget_above_cap_is_left_untouched() {
        // Limit dropped after income changed; the old budget stays.
        let state = StreakState {
            current_streak: 0,
            longest_streak: 0,
            rollover_budget: 300.0,
        };
        let outcome = evaluate_day(state, 20.0, 5.0);
        assert_eq!(outcome.unused, 15.0);
        assert_eq!(outcome.rollover_applied, 0.0);
        assert_eq!(outcome.state.rollover_budget, 300.0);
    }

    #[test]
    fn test_zero_limit_never_rolls_over() {
        let outcome = evaluate_day(StreakState::default(), 0.0, 0.0);
        assert!(outcome.under_budget);
        assert_eq!(outcome.unused, 0.0);
        assert_eq!(outcome.state.rollover_budget, 0.0);

        let outcome = evaluate_day(StreakState::default(), 0.0, 1.0);
        assert!(!outcome.under_budget);
    }

    #[test]
    fn test_sequence_properties() {
        let daily_limit = 40.0;
        let spending = [0.0, 10.0, 55.0, 40.0, 0.0, 0.0, 0.0, 100.0, 3.0, 39.99];
        let mut state = StreakState::default();
        let mut previous_longest = 0;

        for spent in spending {
            let before = state;
            let outcome = evaluate_day(state, daily_limit, spent);
            state = outcome.state;

            assert_eq!(outcome.unused, (daily_limit - spent).max(0.0));
            assert!(state.rollover_budget <= daily_limit * 3.0);
            assert!(state.longest_streak >= previous_longest);
            if spent > daily_limit {
                assert_eq!(state.current_streak, 0);
            } else {
                assert_eq!(state.current_streak, before.current_streak + 1);
            }
            previous_longest = state.longest_streak;
        }
        assert_eq!(state.longest_streak, 4);
        assert_eq!(state.current_streak, 2);
    }

    #[tokio::test]
    async fn test_get_or_create_streak_is_stable() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let first = get_or_create_streak(&db, user.id).await?;
        let second = get_or_create_streak(&db, user.id).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(first.current_streak, 0);
        assert_eq!(first.rollover_budget, 0.0);
        assert!(first.last_streak_date.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_impulse_avoided_counts_and_celebrates() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        for _ in 0..5 {
            record_impulse_avoided(&db, user.id).await?;
        }
        let status = milestone_status(&db, user.id).await?;
        assert_eq!(status.impulses_avoided, 5);
        assert!(status.impulses_5);
        assert!(!status.impulses_20);

        let pending = milestone::pending_celebrations(&db, user.id).await?;
        assert_eq!(pending.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_impulses_saturates_at_zero() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let streak = adjust_impulses_avoided(&db, user.id, -1).await?;
        assert_eq!(streak.impulses_avoided, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_streak() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        assert!(matches!(
            reset_streak(&db, user.id).await,
            Err(Error::NotFound { .. })
        ));

        let streak = get_or_create_streak(&db, user.id).await?;
        let mut active_model: user_streak::ActiveModel = streak.into();
        active_model.current_streak = Set(4);
        active_model.longest_streak = Set(6);
        active_model.update(&db).await?;

        let reset = reset_streak(&db, user.id).await?;
        assert_eq!(reset.current_streak, 0);
        assert_eq!(reset.longest_streak, 6);
        Ok(())
    }
}
