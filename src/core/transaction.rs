//! Transaction business logic - Handles all spending records.
//!
//! Every write keeps category-limit accounting in lockstep: creation adds the amount to
//! the matching limit, deletion takes it back out, and an update moves only the amount
//! difference while it stays in the same category and month (otherwise the old effect is
//! reversed before the new one is applied). Each of these runs inside a single database transaction
//! so a failure never leaves a limit out of step with the ledger.

use crate::{
    core::{calendar, category_limit, user::find_user},
    entities::{Transaction, transaction},
    errors::{Error, Result, ensure_positive_amount},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::debug;

/// Input for a new transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Amount spent, must be positive
    pub amount: f64,
    /// Category label
    pub category: String,
    /// When the money was spent; defaults to now
    pub date: Option<DateTime<Utc>>,
    /// Unplanned purchase flag
    pub is_impulse: bool,
    /// Optional note
    pub note: Option<String>,
    /// Reason for overriding the emergency pause
    pub emergency_reason: Option<String>,
}

impl NewTransaction {
    /// A planned transaction dated now with no note.
    pub fn new(amount: f64, category: impl Into<String>) -> Self {
        Self {
            amount,
            category: category.into(),
            date: None,
            is_impulse: false,
            note: None,
            emergency_reason: None,
        }
    }
}

/// Partial update of a transaction; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    /// New amount
    pub amount: Option<f64>,
    /// New category
    pub category: Option<String>,
    /// New date
    pub date: Option<DateTime<Utc>>,
    /// New impulse flag
    pub is_impulse: Option<bool>,
    /// New note
    pub note: Option<String>,
    /// New emergency reason
    pub emergency_reason: Option<String>,
}

/// Optional filters for [`list_transactions`]
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only transactions at or after this instant
    pub start: Option<DateTime<Utc>>,
    /// Only transactions at or before this instant
    pub end: Option<DateTime<Utc>>,
    /// Only this category
    pub category: Option<String>,
    /// Only impulse (or only planned) transactions
    pub is_impulse: Option<bool>,
}

/// Spending totals for the overview screen
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStats {
    /// Spent today
    pub today_spent: f64,
    /// Spent over the last seven days including today
    pub week_spent: f64,
    /// Spent since the first of the month
    pub month_spent: f64,
    /// Number of impulse transactions ever recorded
    pub impulse_count: u64,
}

/// Inserts a transaction and charges the matching category limit.
///
/// Takes any connection so callers can compose it into a larger database transaction
/// (wishlist purchases, proceeding with an avoided impulse).
pub async fn insert_transaction<C>(
    db: &C,
    user_id: i64,
    new: NewTransaction,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    ensure_positive_amount(new.amount)?;
    let category = new.category.trim().to_string();
    if category.is_empty() {
        return Err(Error::invalid_state("Transaction category cannot be empty"));
    }

    let now = Utc::now();
    let transaction_model = transaction::ActiveModel {
        user_id: Set(user_id),
        amount: Set(new.amount),
        category: Set(category),
        date: Set(new.date.unwrap_or(now)),
        is_impulse: Set(new.is_impulse),
        note: Set(new.note),
        emergency_reason: Set(new.emergency_reason),
        created_at: Set(now),
        ..Default::default()
    };
    let result = transaction_model.insert(db).await?;

    category_limit::record_spend(db, user_id, &result.category, result.date, result.amount)
        .await?;
    debug!(
        "Recorded transaction {} ({:.2} in {}) for user {}",
        result.id, result.amount, result.category, user_id
    );
    Ok(result)
}

/// Creates a new transaction for a user.
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    new: NewTransaction,
) -> Result<transaction::Model> {
    ensure_positive_amount(new.amount)?;

    // Use a transaction to ensure atomicity
    let txn = db.begin().await?;
    find_user(&txn, user_id).await?;
    let result = insert_transaction(&txn, user_id, new).await?;
    txn.commit().await?;

    Ok(result)
}

async fn find_owned_transaction<C>(
    db: &C,
    user_id: i64,
    transaction_id: i64,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))
}

/// Retrieves one of the user's transactions.
pub async fn get_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    transaction_id: i64,
) -> Result<transaction::Model> {
    find_owned_transaction(db, user_id, transaction_id).await
}

/// Lists the user's transactions, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: i64,
    filter: TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find().filter(transaction::Column::UserId.eq(user_id));

    if let Some(start) = filter.start {
        query = query.filter(transaction::Column::Date.gte(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(transaction::Column::Date.lte(end));
    }
    if let Some(category) = filter.category {
        query = query.filter(transaction::Column::Category.eq(category));
    }
    if let Some(is_impulse) = filter.is_impulse {
        query = query.filter(transaction::Column::IsImpulse.eq(is_impulse));
    }

    query
        .order_by_desc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Transactions dated within the given UTC day, newest first.
pub async fn transactions_on_day(
    db: &DatabaseConnection,
    user_id: i64,
    day: NaiveDate,
) -> Result<Vec<transaction::Model>> {
    let (start, end) = calendar::day_range(day);
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lt(end))
        .order_by_desc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of the user's transaction amounts in `[start, end)`.
pub async fn spent_between<C>(
    db: &C,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = Transaction::find()
        .select_only()
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lt(end))
        .into_tuple()
        .one(db)
        .await?;

    Ok(total.flatten().unwrap_or(0.0))
}

/// Sum of the user's transaction amounts dated on `day` (UTC).
pub async fn spent_on_day<C>(db: &C, user_id: i64, day: NaiveDate) -> Result<f64>
where
    C: ConnectionTrait,
{
    let (start, end) = calendar::day_range(day);
    spent_between(db, user_id, start, end).await
}

/// Applies a partial update, moving category-limit accounting along with it.
pub async fn update_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    transaction_id: i64,
    changes: TransactionChanges,
) -> Result<transaction::Model> {
    if let Some(amount) = changes.amount {
        ensure_positive_amount(amount)?;
    }

    let txn = db.begin().await?;
    let existing = find_owned_transaction(&txn, user_id, transaction_id).await?;

    let (old_category, old_date, old_amount) =
        (existing.category.clone(), existing.date, existing.amount);

    let mut active_model: transaction::ActiveModel = existing.into();
    if let Some(amount) = changes.amount {
        active_model.amount = Set(amount);
    }
    if let Some(category) = changes.category {
        active_model.category = Set(category.trim().to_string());
    }
    if let Some(date) = changes.date {
        active_model.date = Set(date);
    }
    if let Some(is_impulse) = changes.is_impulse {
        active_model.is_impulse = Set(is_impulse);
    }
    if let Some(note) = changes.note {
        active_model.note = Set(Some(note));
    }
    if let Some(reason) = changes.emergency_reason {
        active_model.emergency_reason = Set(Some(reason));
    }
    let updated = active_model.update(&txn).await?;

    let same_window = old_category == updated.category
        && calendar::first_of_next_month(old_date.date_naive())
            == calendar::first_of_next_month(updated.date.date_naive());
    if same_window {
        // Only the amount difference moves; edits to other fields leave the limit alone.
        let delta = updated.amount - old_amount;
        if delta > 0.0 {
            category_limit::record_spend(&txn, user_id, &updated.category, updated.date, delta)
                .await?;
        } else if delta < 0.0 {
            category_limit::reverse_spend(&txn, user_id, &updated.category, updated.date, -delta)
                .await?;
        }
    } else {
        category_limit::reverse_spend(&txn, user_id, &old_category, old_date, old_amount).await?;
        category_limit::record_spend(
            &txn,
            user_id,
            &updated.category,
            updated.date,
            updated.amount,
        )
        .await?;
    }

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a transaction and takes its amount back out of the matching category limit.
pub async fn delete_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    transaction_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let transaction = find_owned_transaction(&txn, user_id, transaction_id).await?;

    category_limit::reverse_spend(
        &txn,
        user_id,
        &transaction.category,
        transaction.date,
        transaction.amount,
    )
    .await?;
    transaction.delete(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// Today / week / month totals plus the impulse count.
pub async fn transaction_stats(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<TransactionStats> {
    let (today_start, tomorrow) = calendar::day_range(today);
    let week_start = today_start - Duration::days(6);
    let month_start = calendar::start_of_day(calendar::first_of_month(today));

    let impulse_count = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::IsImpulse.eq(true))
        .count(db)
        .await?;

    Ok(TransactionStats {
        today_spent: spent_between(db, user_id, today_start, tomorrow).await?,
        week_spent: spent_between(db, user_id, week_start, tomorrow).await?,
        month_spent: spent_between(db, user_id, month_start, tomorrow).await?,
        impulse_count,
    })
}
