//! Daily rollover evaluation - persists the streak engine's decisions.
//!
//! [`evaluate_user_day`] is the single entry point for judging a day, used both by the
//! nightly batch and by on-demand requests ([`validate_yesterday`]), so both produce
//! identical results. Each user is evaluated inside its own database transaction; the
//! streak row's `last_streak_date` makes a repeated evaluation of the same day a no-op.
//! Only days that have ended (before the current UTC date) can be evaluated.

use crate::{
    core::{
        calendar, milestone,
        streak::{DayOutcome, StreakState, evaluate_day, get_or_create_streak},
        transaction::{TransactionFilter, list_transactions, spent_on_day},
        user::{find_user, list_users},
    },
    entities::{BudgetRollover, budget_rollover, user_streak},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Outcome of evaluating one user for one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DayEvaluation {
    /// The day was applied
    Evaluated(DayOutcome),
    /// The day (or a later one) was already applied; nothing changed
    AlreadyEvaluated {
        /// Last day applied for this user
        last_evaluated: NaiveDate,
    },
}

/// Summary of a nightly batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyRunReport {
    /// Users whose day was applied
    pub evaluated: Vec<i64>,
    /// Users already evaluated for the day
    pub skipped: Vec<i64>,
    /// Users whose evaluation failed and was rolled back
    pub failed: Vec<i64>,
}

/// Rejects a day that has not ended yet; evaluating it early would lock the
/// nightly run out of it.
fn ensure_day_closed(day: NaiveDate, now: DateTime<Utc>) -> Result<()> {
    let today = now.date_naive();
    if day >= today {
        return Err(Error::invalid_state(format!(
            "Cannot evaluate {day} before it has ended (today is {today})"
        )));
    }
    Ok(())
}

/// Judges `day` for one user and persists the result atomically.
///
/// Sums the user's transactions dated `day`, applies [`evaluate_day`], appends a
/// rollover ledger row when there was unused budget, advances `last_streak_date` and
/// records newly reached milestones.
pub async fn evaluate_user_day(
    db: &DatabaseConnection,
    user_id: i64,
    day: NaiveDate,
) -> Result<DayEvaluation> {
    ensure_day_closed(day, Utc::now())?;
    let txn = db.begin().await?;

    let user = find_user(&txn, user_id).await?;
    let streak = get_or_create_streak(&txn, user_id).await?;

    if let Some(last_evaluated) = streak.last_streak_date.filter(|last| *last >= day) {
        txn.commit().await?;
        debug!(
            "User {} already evaluated through {}, skipping {}",
            user_id, last_evaluated, day
        );
        return Ok(DayEvaluation::AlreadyEvaluated { last_evaluated });
    }

    let spent = spent_on_day(&txn, user_id, day).await?;
    let outcome = evaluate_day(StreakState::from(&streak), user.daily_limit(), spent);

    if outcome.has_ledger_entry() {
        budget_rollover::ActiveModel {
            user_id: Set(user_id),
            date: Set(day),
            unused_amount: Set(outcome.unused),
            rollover_amount: Set(outcome.rollover_applied),
            applied: Set(outcome.rollover_applied > 0.0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let mut active_model: user_streak::ActiveModel = streak.into();
    active_model.current_streak = Set(outcome.state.current_streak);
    active_model.longest_streak = Set(outcome.state.longest_streak);
    active_model.rollover_budget = Set(outcome.state.rollover_budget);
    active_model.last_streak_date = Set(Some(day));
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(&txn).await?;

    milestone::record_new_milestones(&txn, &updated).await?;

    txn.commit().await?;

    debug!(
        "User {} on {}: spent {:.2} of {:.2}, streak {}, rollover {:.2}",
        user_id,
        day,
        outcome.spent,
        outcome.daily_limit,
        outcome.state.current_streak,
        outcome.state.rollover_budget
    );
    Ok(DayEvaluation::Evaluated(outcome))
}

/// Evaluates `day` for every user. A failure for one user is logged and does not
/// affect the others.
pub async fn run_daily_rollover(db: &DatabaseConnection, day: NaiveDate) -> Result<DailyRunReport> {
    ensure_day_closed(day, Utc::now())?;
    let users = list_users(db).await?;
    let mut report = DailyRunReport::default();

    for user in users {
        match evaluate_user_day(db, user.id, day).await {
            Ok(DayEvaluation::Evaluated(_)) => report.evaluated.push(user.id),
            Ok(DayEvaluation::AlreadyEvaluated { .. }) => report.skipped.push(user.id),
            Err(e) => {
                error!("Daily rollover for user {} on {} failed: {}", user.id, day, e);
                report.failed.push(user.id);
            }
        }
    }

    info!(
        "Daily rollover for {}: {} evaluated, {} skipped, {} failed",
        day,
        report.evaluated.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

/// On-demand evaluation of the day before `now` for one user.
///
/// Same code path as the nightly run, so calling both for the same day applies it once.
pub async fn validate_yesterday(
    db: &DatabaseConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<DayEvaluation> {
    evaluate_user_day(db, user_id, now.date_naive() - Duration::days(1)).await
}

/// Rollover ledger rows for the last `days` days up to `today`, newest first.
pub async fn rollover_history(
    db: &DatabaseConnection,
    user_id: i64,
    days: u32,
    today: NaiveDate,
) -> Result<Vec<budget_rollover::Model>> {
    let start = today - Duration::days(i64::from(days.max(1)) - 1);
    BudgetRollover::find()
        .filter(budget_rollover::Column::UserId.eq(user_id))
        .filter(budget_rollover::Column::Date.gte(start))
        .filter(budget_rollover::Column::Date.lte(today))
        .order_by_desc(budget_rollover::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// How today's spending compares with what is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    /// Comfortably within budget
    Ok,
    /// Less than a fifth of the daily limit left
    Warning,
    /// Spent more than available
    Over,
}

/// What the user may still spend today
#[derive(Debug, Clone, Serialize)]
pub struct TodayBudget {
    /// Baseline allowance
    pub daily_limit: f64,
    /// Accumulated rollover budget
    pub rollover: f64,
    /// Spent so far today
    pub spent_today: f64,
    /// `daily_limit + rollover - spent_today`
    pub available: f64,
    /// Traffic-light status
    pub status: BudgetStatus,
}

/// Today's available budget, rollover included.
pub async fn today_budget(
    db: &DatabaseConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<TodayBudget> {
    let user = find_user(db, user_id).await?;
    let streak = get_or_create_streak(db, user_id).await?;
    let daily_limit = user.daily_limit();
    let spent_today = spent_on_day(db, user_id, now.date_naive()).await?;
    let available = daily_limit + streak.rollover_budget - spent_today;

    let status = if available < 0.0 {
        BudgetStatus::Over
    } else if available < daily_limit * 0.2 {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Ok
    };

    Ok(TodayBudget {
        daily_limit,
        rollover: streak.rollover_budget,
        spent_today,
        available,
        status,
    })
}

/// Heat-map bucket for one day of spending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    /// At most half the daily limit
    Safe,
    /// At most 80 %
    Ok,
    /// At most the full limit
    Warning,
    /// Over the limit
    Over,
}

impl DayStatus {
    /// Buckets a percentage of the daily limit.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage <= 50.0 {
            Self::Safe
        } else if percentage <= 80.0 {
            Self::Ok
        } else if percentage <= 100.0 {
            Self::Warning
        } else {
            Self::Over
        }
    }
}

/// One day in the budget history
#[derive(Debug, Clone, Serialize)]
pub struct DayBudget {
    /// The day
    pub date: NaiveDate,
    /// Total spent
    pub spent: f64,
    /// Spent as a percentage of the daily limit
    pub percentage: f64,
    /// Bucket
    pub status: DayStatus,
}

/// Per-day spending against the daily limit for the last `days` days, oldest first.
pub async fn budget_history(
    db: &DatabaseConnection,
    user_id: i64,
    days: u32,
    today: NaiveDate,
) -> Result<Vec<DayBudget>> {
    let user = find_user(db, user_id).await?;
    let daily_limit = user.daily_limit();
    let days = days.max(1);
    let first_day = today - Duration::days(i64::from(days) - 1);

    let transactions = list_transactions(
        db,
        user_id,
        TransactionFilter {
            start: Some(calendar::start_of_day(first_day)),
            end: Some(calendar::day_range(today).1 - Duration::nanoseconds(1)),
            ..Default::default()
        },
    )
    .await?;

    let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for txn in transactions {
        *by_day.entry(txn.date.date_naive()).or_insert(0.0) += txn.amount;
    }

    Ok(first_day
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let spent = by_day.get(&date).copied().unwrap_or(0.0);
            let percentage = if daily_limit > 0.0 {
                spent / daily_limit * 100.0
            } else {
                0.0
            };
            DayBudget {
                date,
                spent,
                percentage,
                status: DayStatus::from_percentage(percentage),
            }
        })
        .collect())
}
