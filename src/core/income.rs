//! Income records.
//!
//! Income is tracked for reporting only; it does not feed the daily limit, which is
//! derived from the user's configured monthly income.

use crate::{
    core::{calendar, user::find_user},
    entities::{Income, income},
    errors::{Error, Result, ensure_positive_amount},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::BTreeMap;

/// Common income sources offered to clients. Any other label is accepted.
pub const INCOME_SOURCES: [&str; 9] = [
    "Gift",
    "Freelance",
    "Side Job",
    "Bonus",
    "Refund",
    "Investment",
    "Cashback",
    "Sold Item",
    "Other",
];

/// Largest page size [`list_incomes`] returns.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Input for a new income record
#[derive(Debug, Clone)]
pub struct NewIncome {
    /// Amount received
    pub amount: f64,
    /// Where it came from
    pub source: String,
    /// Free text
    pub description: Option<String>,
    /// When it was received; defaults to now
    pub date: Option<DateTime<Utc>>,
}

/// Partial update of an income record
#[derive(Debug, Clone, Default)]
pub struct IncomeChanges {
    /// New amount
    pub amount: Option<f64>,
    /// New source
    pub source: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New date
    pub date: Option<DateTime<Utc>>,
}

/// Filters and paging for [`list_incomes`]
#[derive(Debug, Clone)]
pub struct IncomeQuery {
    /// Only income on or after this day
    pub start: Option<NaiveDate>,
    /// Only income on or before this day
    pub end: Option<NaiveDate>,
    /// Only this source
    pub source: Option<String>,
    /// Page size, 1 to [`MAX_PAGE_SIZE`]
    pub limit: u64,
    /// Rows to skip
    pub offset: u64,
}

impl Default for IncomeQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            source: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of income records
#[derive(Debug, Clone, Serialize)]
pub struct IncomePage {
    /// Records on this page, newest first
    pub incomes: Vec<income::Model>,
    /// Number of records matching the filters
    pub total: u64,
    /// Sum of all the user's income, unfiltered
    pub total_amount: f64,
}

/// Income overview
#[derive(Debug, Clone, Serialize)]
pub struct IncomeSummary {
    /// Received this calendar month
    pub total_this_month: f64,
    /// Received this calendar year
    pub total_this_year: f64,
    /// This year's income per source
    pub by_source: BTreeMap<String, f64>,
    /// The five most recent records
    pub recent_incomes: Vec<income::Model>,
}

/// Records income for a user.
pub async fn create_income(
    db: &DatabaseConnection,
    user_id: i64,
    new: NewIncome,
) -> Result<income::Model> {
    ensure_positive_amount(new.amount)?;
    if new.source.trim().is_empty() {
        return Err(Error::invalid_state("Income source cannot be empty"));
    }
    find_user(db, user_id).await?;

    let now = Utc::now();
    income::ActiveModel {
        user_id: Set(user_id),
        amount: Set(new.amount),
        source: Set(new.source.trim().to_string()),
        description: Set(new.description),
        date: Set(new.date.unwrap_or(now)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Retrieves one of the user's income records.
pub async fn get_income(
    db: &DatabaseConnection,
    user_id: i64,
    income_id: i64,
) -> Result<income::Model> {
    Income::find_by_id(income_id)
        .filter(income::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Income", income_id))
}

async fn sum_income(
    db: &DatabaseConnection,
    user_id: i64,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<f64> {
    let mut query = Income::find()
        .select_only()
        .column_as(Expr::col(income::Column::Amount).sum(), "total")
        .filter(income::Column::UserId.eq(user_id));
    if let Some((start, end)) = range {
        query = query
            .filter(income::Column::Date.gte(start))
            .filter(income::Column::Date.lt(end));
    }
    let total: Option<Option<f64>> = query.into_tuple().one(db).await?;
    Ok(total.flatten().unwrap_or(0.0))
}

/// Lists income with optional filters, newest first, one page at a time.
pub async fn list_incomes(
    db: &DatabaseConnection,
    user_id: i64,
    query: IncomeQuery,
) -> Result<IncomePage> {
    let mut select = Income::find().filter(income::Column::UserId.eq(user_id));
    if let Some(start) = query.start {
        select = select.filter(income::Column::Date.gte(calendar::start_of_day(start)));
    }
    if let Some(end) = query.end {
        select = select.filter(income::Column::Date.lt(calendar::day_range(end).1));
    }
    if let Some(source) = query.source {
        select = select.filter(income::Column::Source.eq(source));
    }

    let total = select.clone().count(db).await?;
    let incomes = select
        .order_by_desc(income::Column::Date)
        .offset(query.offset)
        .limit(query.limit.clamp(1, MAX_PAGE_SIZE))
        .all(db)
        .await?;

    Ok(IncomePage {
        incomes,
        total,
        total_amount: sum_income(db, user_id, None).await?,
    })
}

/// Applies a partial update to an income record.
pub async fn update_income(
    db: &DatabaseConnection,
    user_id: i64,
    income_id: i64,
    changes: IncomeChanges,
) -> Result<income::Model> {
    if let Some(amount) = changes.amount {
        ensure_positive_amount(amount)?;
    }
    let income = get_income(db, user_id, income_id).await?;

    let mut active_model: income::ActiveModel = income.into();
    if let Some(amount) = changes.amount {
        active_model.amount = Set(amount);
    }
    if let Some(source) = changes.source {
        active_model.source = Set(source.trim().to_string());
    }
    if let Some(description) = changes.description {
        active_model.description = Set(Some(description));
    }
    if let Some(date) = changes.date {
        active_model.date = Set(date);
    }
    active_model.update(db).await.map_err(Into::into)
}

/// Deletes an income record.
pub async fn delete_income(db: &DatabaseConnection, user_id: i64, income_id: i64) -> Result<()> {
    let income = get_income(db, user_id, income_id).await?;
    income.delete(db).await?;
    Ok(())
}

/// Month and year totals, per-source breakdown and recent records as of `today`.
pub async fn income_summary(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<IncomeSummary> {
    let month_start = calendar::start_of_day(calendar::first_of_month(today));
    let month_end = calendar::start_of_day(calendar::first_of_next_month(today));
    let year_start = calendar::start_of_day(
        NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
    );
    let year_end = calendar::start_of_day(
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(today),
    );

    let this_year = Income::find()
        .filter(income::Column::UserId.eq(user_id))
        .filter(income::Column::Date.gte(year_start))
        .filter(income::Column::Date.lt(year_end))
        .all(db)
        .await?;
    let mut by_source = BTreeMap::new();
    for record in &this_year {
        *by_source.entry(record.source.clone()).or_insert(0.0) += record.amount;
    }

    let recent_incomes = Income::find()
        .filter(income::Column::UserId.eq(user_id))
        .order_by_desc(income::Column::Date)
        .limit(5)
        .all(db)
        .await?;

    Ok(IncomeSummary {
        total_this_month: sum_income(db, user_id, Some((month_start, month_end))).await?,
        total_this_year: this_year.iter().map(|record| record.amount).sum(),
        by_source,
        recent_incomes,
    })
}
