//! Report generation business logic.
//!
//! Weekly and monthly spending summaries built from the transaction ledger, plus an
//! anonymous month-to-date comparison against other users. Weeks are the seven days
//! ending on the given day. All functions return structured data and leave formatting
//! to the caller.

use crate::{
    core::{
        calendar,
        streak::get_or_create_streak,
        transaction::{TransactionFilter, list_transactions, spent_between},
        user::find_user,
    },
    entities::{Reflection, Transaction, reflection, transaction},
    errors::Result,
};
use chrono::{Duration, NaiveDate};
use sea_orm::{QueryOrder, QuerySelect, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashMap;

/// Days in a reporting week.
const WEEK_DAYS: i64 = 7;

/// Percentile reported when nobody has spent anything this month.
const NEUTRAL_PERCENTILE: f64 = 50.0;

/// "Weekly wins" summary for the seven days ending on `end`
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    /// First day of the week
    pub start: NaiveDate,
    /// Last day of the week
    pub end: NaiveDate,
    /// Spent during the week
    pub total_spent: f64,
    /// Seven daily limits
    pub weekly_budget: f64,
    /// `weekly_budget - total_spent`
    pub saved: f64,
    /// Impulse transactions during the week
    pub impulse_count: usize,
    /// Days with spending at or under the daily limit
    pub safe_days: usize,
    /// Current streak
    pub current_streak: i32,
    /// What the previous week saved against the same budget
    pub last_week_saved: f64,
    /// `saved - last_week_saved`
    pub savings_improvement: f64,
}

/// Spending per category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    /// Category label
    pub category: String,
    /// Total spent
    pub amount: f64,
}

/// Month-to-date summary
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    /// First day of the month
    pub start: NaiveDate,
    /// Report day
    pub end: NaiveDate,
    /// Days covered so far
    pub days: i64,
    /// Spent this month
    pub spent: f64,
    /// Daily limit times days covered
    pub budget: f64,
    /// `budget - spent`
    pub remaining: f64,
    /// Share of the budget used, 0 without a budget
    pub percentage_used: f64,
    /// Number of impulse transactions
    pub impulse_count: usize,
    /// Amount spent on impulses
    pub impulse_total: f64,
    /// Categories, biggest first
    pub categories: Vec<CategoryTotal>,
    /// `spent / days`
    pub daily_average: f64,
}

/// This week against last week
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySavings {
    /// Spent in the seven days ending today
    pub this_week_spent: f64,
    /// Spent in the seven days before that
    pub last_week_spent: f64,
    /// `last_week_spent - this_week_spent`
    pub savings: f64,
    /// Savings as a percentage of last week's spending
    pub percentage_change: f64,
    /// Whether this week was cheaper
    pub improved: bool,
}

/// Reflection habits over a period
#[derive(Debug, Clone, Serialize)]
pub struct ReflectionInsights {
    /// Days in the period
    pub days: u32,
    /// Reflections written
    pub total_reflections: usize,
    /// Reflections per day, as a percentage
    pub reflection_rate: f64,
    /// Reflections naming a regretted purchase
    pub regret_count: usize,
    /// Reflections naming a good purchase
    pub good_count: usize,
    /// Most recent reflections
    pub recent: Vec<reflection::Model>,
}

/// The user's month so far, ranked against every user who spent this month
#[derive(Debug, Clone, Serialize)]
pub struct PeerBenchmarks {
    /// Month-to-date spending
    pub month_spent: f64,
    /// Share of spending users (this one included) whose month total is at least
    /// `month_spent`; higher means thriftier
    pub spending_percentile: f64,
    /// Users with any spending this month
    pub peer_count: usize,
    /// Impulse transactions this month
    pub impulse_count: usize,
    /// Current streak length
    pub current_streak: i32,
    /// Rollover budget available
    pub rollover_budget: f64,
}

async fn transactions_between(
    db: &DatabaseConnection,
    user_id: i64,
    first_day: NaiveDate,
    last_day: NaiveDate,
) -> Result<Vec<transaction::Model>> {
    list_transactions(
        db,
        user_id,
        TransactionFilter {
            start: Some(calendar::start_of_day(first_day)),
            end: Some(calendar::day_range(last_day).1 - Duration::nanoseconds(1)),
            ..Default::default()
        },
    )
    .await
}

/// Weekly wins for the seven days ending on `today`.
pub async fn weekly_summary(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<WeeklySummary> {
    let user = find_user(db, user_id).await?;
    let daily_limit = user.daily_limit();
    let start = today - Duration::days(WEEK_DAYS - 1);

    let transactions = transactions_between(db, user_id, start, today).await?;
    let total_spent: f64 = transactions.iter().map(|t| t.amount).sum();
    let impulse_count = transactions.iter().filter(|t| t.is_impulse).count();

    let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for t in &transactions {
        *by_day.entry(t.date.date_naive()).or_insert(0.0) += t.amount;
    }
    let safe_days = by_day.values().filter(|spent| **spent <= daily_limit).count();

    let weekly_budget = daily_limit * WEEK_DAYS as f64;
    let saved = weekly_budget - total_spent;

    let last_week_start = calendar::start_of_day(start - Duration::days(WEEK_DAYS));
    let last_week_spent =
        spent_between(db, user_id, last_week_start, calendar::start_of_day(start)).await?;
    let last_week_saved = weekly_budget - last_week_spent;

    let streak = get_or_create_streak(db, user_id).await?;

    Ok(WeeklySummary {
        start,
        end: today,
        total_spent,
        weekly_budget,
        saved,
        impulse_count,
        safe_days,
        current_streak: streak.current_streak,
        last_week_saved,
        savings_improvement: saved - last_week_saved,
    })
}

/// Month-to-date totals, impulses and category breakdown.
pub async fn monthly_summary(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<MonthlySummary> {
    let user = find_user(db, user_id).await?;
    let start = calendar::first_of_month(today);
    let days = (today - start).num_days() + 1;

    let transactions = transactions_between(db, user_id, start, today).await?;
    let spent: f64 = transactions.iter().map(|t| t.amount).sum();
    let impulses: Vec<&transaction::Model> = transactions.iter().filter(|t| t.is_impulse).collect();

    let mut by_category: HashMap<&str, f64> = HashMap::new();
    for t in &transactions {
        *by_category.entry(t.category.as_str()).or_insert(0.0) += t.amount;
    }
    let mut categories: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, amount)| CategoryTotal {
            category: category.to_string(),
            amount,
        })
        .collect();
    categories.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    let budget = user.daily_limit() * days as f64;
    Ok(MonthlySummary {
        start,
        end: today,
        days,
        spent,
        budget,
        remaining: budget - spent,
        percentage_used: if budget > 0.0 {
            spent / budget * 100.0
        } else {
            0.0
        },
        impulse_count: impulses.len(),
        impulse_total: impulses.iter().map(|t| t.amount).sum(),
        categories,
        daily_average: spent / days as f64,
    })
}

/// Compares the seven days ending on `today` with the seven days before.
pub async fn weekly_savings(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<WeeklySavings> {
    let tomorrow = calendar::day_range(today).1;
    let week_start = tomorrow - Duration::days(WEEK_DAYS);
    let last_week_start = week_start - Duration::days(WEEK_DAYS);

    let this_week_spent = spent_between(db, user_id, week_start, tomorrow).await?;
    let last_week_spent = spent_between(db, user_id, last_week_start, week_start).await?;
    let savings = last_week_spent - this_week_spent;

    Ok(WeeklySavings {
        this_week_spent,
        last_week_spent,
        savings,
        percentage_change: if last_week_spent > 0.0 {
            savings / last_week_spent * 100.0
        } else {
            0.0
        },
        improved: savings > 0.0,
    })
}

/// How regularly the user reflected over the last `days` days.
pub async fn reflection_insights(
    db: &DatabaseConnection,
    user_id: i64,
    days: u32,
    today: NaiveDate,
) -> Result<ReflectionInsights> {
    let days = days.max(1);
    let start = today - Duration::days(i64::from(days) - 1);
    let reflections = Reflection::find()
        .filter(reflection::Column::UserId.eq(user_id))
        .filter(reflection::Column::Date.gte(start))
        .filter(reflection::Column::Date.lte(today))
        .order_by_desc(reflection::Column::Date)
        .all(db)
        .await?;

    let total_reflections = reflections.len();
    Ok(ReflectionInsights {
        days,
        total_reflections,
        reflection_rate: total_reflections as f64 / f64::from(days) * 100.0,
        regret_count: reflections
            .iter()
            .filter(|r| r.regret_purchase.is_some())
            .count(),
        good_count: reflections.iter().filter(|r| r.good_purchase.is_some()).count(),
        recent: reflections.into_iter().take(5).collect(),
    })
}

/// Month-to-date spending percentile against other users, with the user's own
/// impulse count, streak and rollover.
pub async fn peer_benchmarks(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<PeerBenchmarks> {
    find_user(db, user_id).await?;
    let month_start = calendar::first_of_month(today);

    let transactions = transactions_between(db, user_id, month_start, today).await?;
    let month_spent: f64 = transactions.iter().map(|t| t.amount).sum();
    let impulse_count = transactions.iter().filter(|t| t.is_impulse).count();

    let peer_totals: Vec<(i64, Option<f64>)> = Transaction::find()
        .select_only()
        .column(transaction::Column::UserId)
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::Date.gte(calendar::start_of_day(month_start)))
        .filter(transaction::Column::Date.lt(calendar::day_range(today).1))
        .group_by(transaction::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;

    let peer_count = peer_totals.len();
    let spending_percentile = if peer_count == 0 {
        NEUTRAL_PERCENTILE
    } else {
        let at_or_above = peer_totals
            .iter()
            .filter(|(_, total)| total.unwrap_or(0.0) >= month_spent)
            .count();
        at_or_above as f64 / peer_count as f64 * 100.0
    };

    let streak = get_or_create_streak(db, user_id).await?;
    Ok(PeerBenchmarks {
        month_spent,
        spending_percentile,
        peer_count,
        impulse_count,
        current_streak: streak.current_streak,
        rollover_budget: streak.rollover_budget,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{
            reflection::{ReflectionInput, create_reflection},
            transaction::{NewTransaction, create_transaction},
        },
        test_utils::*,
    };
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    async fn spend(
        db: &DatabaseConnection,
        user_id: i64,
        d: u32,
        category: &str,
        amount: f64,
        is_impulse: bool,
    ) -> Result<()> {
        let mut new = NewTransaction::new(amount, category);
        new.date = Some(Utc.with_ymd_and_hms(2024, 8, d, 12, 0, 0).unwrap());
        new.is_impulse = is_impulse;
        create_transaction(db, user_id, new).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_weekly_summary() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        spend(&db, user.id, 14, "Food", 20.0, false).await?;
        spend(&db, user.id, 12, "Food", 60.0, true).await?;
        spend(&db, user.id, 9, "Food", 30.0, false).await?;
        spend(&db, user.id, 2, "Food", 100.0, false).await?;

        let summary = weekly_summary(&db, user.id, day(14)).await?;
        assert_eq!(summary.start, day(8));
        assert_eq!(summary.total_spent, 110.0);
        assert_eq!(summary.weekly_budget, 350.0);
        assert_eq!(summary.saved, 240.0);
        assert_eq!(summary.impulse_count, 1);
        assert_eq!(summary.safe_days, 2);
        assert_eq!(summary.last_week_saved, 250.0);
        assert_eq!(summary.savings_improvement, -10.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_summary() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        spend(&db, user.id, 1, "Food", 40.0, false).await?;
        spend(&db, user.id, 3, "Fun", 90.0, true).await?;
        spend(&db, user.id, 4, "Food", 20.0, false).await?;

        let summary = monthly_summary(&db, user.id, day(5)).await?;
        assert_eq!(summary.days, 5);
        assert_eq!(summary.spent, 150.0);
        assert_eq!(summary.budget, 250.0);
        assert_eq!(summary.remaining, 100.0);
        assert_eq!(summary.percentage_used, 60.0);
        assert_eq!(summary.impulse_count, 1);
        assert_eq!(summary.impulse_total, 90.0);
        assert_eq!(summary.categories[0].category, "Fun");
        assert_eq!(summary.categories[1].amount, 60.0);
        assert_eq!(summary.daily_average, 30.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_weekly_savings() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        spend(&db, user.id, 10, "Food", 50.0, false).await?;
        spend(&db, user.id, 3, "Food", 80.0, false).await?;

        let savings = weekly_savings(&db, user.id, day(14)).await?;
        assert_eq!(savings.this_week_spent, 50.0);
        assert_eq!(savings.last_week_spent, 80.0);
        assert_eq!(savings.savings, 30.0);
        assert_eq!(savings.percentage_change, 37.5);
        assert!(savings.improved);
        Ok(())
    }

    #[tokio::test]
    async fn test_reflection_insights() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_reflection(
            &db,
            user.id,
            day(1),
            ReflectionInput {
                regret_purchase: Some("Gadget".to_string()),
                ..Default::default()
            },
        )
        .await?;
        create_reflection(
            &db,
            user.id,
            day(2),
            ReflectionInput {
                good_purchase: Some("Groceries".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let insights = reflection_insights(&db, user.id, 10, day(10)).await?;
        assert_eq!(insights.total_reflections, 2);
        assert_eq!(insights.reflection_rate, 20.0);
        assert_eq!(insights.regret_count, 1);
        assert_eq!(insights.good_count, 1);
        assert_eq!(insights.recent[0].date, day(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_peer_benchmarks_ranks_month_spending() -> Result<()> {
        let (db, thrifty) = setup_with_user().await?;
        let middle = create_test_user(&db, "middle").await?;
        let lavish = create_test_user(&db, "lavish").await?;
        let idle = create_test_user(&db, "idle").await?;
        spend(&db, thrifty.id, 2, "Food", 20.0, false).await?;
        spend(&db, thrifty.id, 4, "Fun", 15.0, true).await?;
        spend(&db, middle.id, 3, "Food", 80.0, false).await?;
        spend(&db, lavish.id, 5, "Fun", 300.0, true).await?;
        // Last month and later this month are outside the window
        spend(&db, middle.id, 20, "Food", 500.0, false).await?;
        let mut july = NewTransaction::new(900.0, "Food");
        july.date = Some(Utc.with_ymd_and_hms(2024, 7, 31, 23, 0, 0).unwrap());
        create_transaction(&db, thrifty.id, july).await?;

        let thrifty_view = peer_benchmarks(&db, thrifty.id, day(10)).await?;
        assert_eq!(thrifty_view.month_spent, 35.0);
        assert_eq!(thrifty_view.peer_count, 3);
        assert_eq!(thrifty_view.spending_percentile, 100.0);
        assert_eq!(thrifty_view.impulse_count, 1);
        assert_eq!(thrifty_view.current_streak, 0);
        assert_eq!(thrifty_view.rollover_budget, 0.0);

        let lavish_view = peer_benchmarks(&db, lavish.id, day(10)).await?;
        assert_eq!(lavish_view.month_spent, 300.0);
        let one_third = 100.0 / 3.0;
        assert!((lavish_view.spending_percentile - one_third).abs() < 1e-9);

        let idle_view = peer_benchmarks(&db, idle.id, day(10)).await?;
        assert_eq!(idle_view.month_spent, 0.0);
        assert_eq!(idle_view.spending_percentile, 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_peer_benchmarks_without_spending() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let benchmarks = peer_benchmarks(&db, user.id, day(10)).await?;
        assert_eq!(benchmarks.peer_count, 0);
        assert_eq!(benchmarks.spending_percentile, 50.0);

        assert!(matches!(
            peer_benchmarks(&db, user.id + 99, day(10)).await,
            Err(crate::errors::Error::NotFound { .. })
        ));
        Ok(())
    }
}
