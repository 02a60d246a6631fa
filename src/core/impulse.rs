//! Avoided impulses - purchases the user talked themselves out of.
//!
//! Every stored impulse also bumps the streak row's counter so milestones stay in
//! step. Proceeding with an impulse turns it into a real impulse transaction.

use crate::{
    core::{
        streak::adjust_impulses_avoided,
        transaction::{NewTransaction, insert_transaction},
        user::find_user,
    },
    entities::{AvoidedImpulse, avoided_impulse, transaction},
    errors::{Error, Result, ensure_positive_amount},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::info;

/// Input for a new avoided impulse
#[derive(Debug, Clone)]
pub struct NewAvoidedImpulse {
    /// What the purchase would have cost
    pub amount: f64,
    /// Category it would have been booked under
    pub category: String,
    /// What it was
    pub description: Option<String>,
}

/// Stores an avoided impulse and increments the counter on any connection.
pub async fn store_avoided_impulse<C>(
    db: &C,
    user_id: i64,
    new: NewAvoidedImpulse,
    avoided_at: DateTime<Utc>,
) -> Result<avoided_impulse::Model>
where
    C: ConnectionTrait,
{
    ensure_positive_amount(new.amount)?;

    let impulse = avoided_impulse::ActiveModel {
        user_id: Set(user_id),
        amount: Set(new.amount),
        category: Set(new.category),
        description: Set(new.description),
        avoided_at: Set(avoided_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    adjust_impulses_avoided(db, user_id, 1).await?;
    Ok(impulse)
}

/// Records an avoided impulse for the user.
pub async fn record_avoided_impulse(
    db: &DatabaseConnection,
    user_id: i64,
    new: NewAvoidedImpulse,
) -> Result<avoided_impulse::Model> {
    ensure_positive_amount(new.amount)?;

    let txn = db.begin().await?;
    find_user(&txn, user_id).await?;
    let impulse = store_avoided_impulse(&txn, user_id, new, Utc::now()).await?;
    txn.commit().await?;

    info!(
        "User {} avoided a {:.2} purchase in {}",
        user_id, impulse.amount, impulse.category
    );
    Ok(impulse)
}

/// Lists the user's avoided impulses, newest first.
pub async fn list_avoided_impulses(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<avoided_impulse::Model>> {
    AvoidedImpulse::find()
        .filter(avoided_impulse::Column::UserId.eq(user_id))
        .order_by_desc(avoided_impulse::Column::AvoidedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Totals across the user's avoided impulses
#[derive(Debug, Clone, Serialize)]
pub struct ImpulseSummary {
    /// Number of impulses avoided
    pub count: usize,
    /// Money not spent
    pub total_saved: f64,
}

/// Count and total of avoided impulses.
pub async fn impulse_summary(db: &DatabaseConnection, user_id: i64) -> Result<ImpulseSummary> {
    let impulses = list_avoided_impulses(db, user_id).await?;
    Ok(ImpulseSummary {
        count: impulses.len(),
        total_saved: impulses.iter().map(|i| i.amount).sum(),
    })
}

async fn find_owned_impulse<C>(
    db: &C,
    user_id: i64,
    impulse_id: i64,
) -> Result<avoided_impulse::Model>
where
    C: ConnectionTrait,
{
    AvoidedImpulse::find_by_id(impulse_id)
        .filter(avoided_impulse::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Avoided impulse", impulse_id))
}

/// Deletes an avoided impulse record. The counter is left as it is.
pub async fn delete_avoided_impulse(
    db: &DatabaseConnection,
    user_id: i64,
    impulse_id: i64,
) -> Result<()> {
    let impulse = find_owned_impulse(db, user_id, impulse_id).await?;
    impulse.delete(db).await?;
    Ok(())
}

/// The user gave in: the impulse becomes an impulse transaction, the record is
/// removed and the counter goes down by one (never below zero).
pub async fn proceed_with_impulse(
    db: &DatabaseConnection,
    user_id: i64,
    impulse_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;
    let impulse = find_owned_impulse(&txn, user_id, impulse_id).await?;

    let mut new = NewTransaction::new(impulse.amount, impulse.category.clone());
    new.is_impulse = true;
    new.note = Some(
        impulse
            .description
            .clone()
            .unwrap_or_else(|| "Proceeded with impulse".to_string()),
    );
    let created = insert_transaction(&txn, user_id, new).await?;

    impulse.delete(&txn).await?;
    adjust_impulses_avoided(&txn, user_id, -1).await?;
    txn.commit().await?;

    info!(
        "User {} proceeded with impulse {} as transaction {}",
        user_id, impulse_id, created.id
    );
    Ok(created)
}
