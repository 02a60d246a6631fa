//! Wishlist cooldown engine.
//!
//! The waiting period of an item is derived from its price through a
//! [`CooldownPolicy`]. Items move `waiting -> ready` when the period has elapsed
//! (swept nightly by [`promote_ready_items`]) and end `purchased` or `removed`.
//! Purchasing books a regular transaction; removing counts as an avoided impulse.

use crate::{
    core::{
        impulse::{NewAvoidedImpulse, store_avoided_impulse},
        transaction::{NewTransaction, insert_transaction},
        user::find_user,
    },
    entities::{WishlistItem, WishlistStatus, transaction, wishlist_item},
    errors::{Error, Result, ensure_positive_amount},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default transaction category for purchased items.
pub const DEFAULT_PURCHASE_CATEGORY: &str = "Shopping";
/// Category recorded for an abandoned item.
pub const ABANDONED_CATEGORY: &str = "Wishlist";

/// One row of the price-to-cooldown table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownTier {
    /// Inclusive upper price bound; `None` matches any price
    #[serde(default)]
    pub max_price: Option<f64>,
    /// Waiting period for prices in this tier
    pub days: i32,
}

/// Ordered price tiers; the first tier whose bound covers the price wins
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownPolicy {
    tiers: Vec<CooldownTier>,
}

impl CooldownPolicy {
    /// Builds a policy from tiers ordered by ascending bound, the last one unbounded.
    pub fn new(tiers: Vec<CooldownTier>) -> Result<Self> {
        let Some((last, bounded)) = tiers.split_last() else {
            return Err(Error::Config {
                message: "wishlist.cooldown_tiers must not be empty".to_string(),
            });
        };
        if last.max_price.is_some() {
            return Err(Error::Config {
                message: "the last wishlist cooldown tier must not have a max_price".to_string(),
            });
        }

        let mut previous = f64::NEG_INFINITY;
        for tier in bounded {
            let Some(bound) = tier.max_price else {
                return Err(Error::Config {
                    message: "only the last wishlist cooldown tier may omit max_price"
                        .to_string(),
                });
            };
            if !bound.is_finite() || bound <= previous {
                return Err(Error::Config {
                    message: format!("wishlist cooldown bound {bound} is not ascending"),
                });
            }
            previous = bound;
        }
        if tiers.iter().any(|t| t.days < 0) {
            return Err(Error::Config {
                message: "wishlist cooldown days must not be negative".to_string(),
            });
        }

        Ok(Self { tiers })
    }

    /// ≤ 50 → 14 days, ≤ 150 → 30 days, otherwise 45 days.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tiers: vec![
                CooldownTier {
                    max_price: Some(50.0),
                    days: 14,
                },
                CooldownTier {
                    max_price: Some(150.0),
                    days: 30,
                },
                CooldownTier {
                    max_price: None,
                    days: 45,
                },
            ],
        }
    }

    /// ≤ 100 → 30 days, ≤ 200 → 45 days, ≤ 500 → 60 days, otherwise 90 days.
    #[must_use]
    pub fn extended() -> Self {
        Self {
            tiers: vec![
                CooldownTier {
                    max_price: Some(100.0),
                    days: 30,
                },
                CooldownTier {
                    max_price: Some(200.0),
                    days: 45,
                },
                CooldownTier {
                    max_price: Some(500.0),
                    days: 60,
                },
                CooldownTier {
                    max_price: None,
                    days: 90,
                },
            ],
        }
    }

    /// Waiting period for an item of the given price.
    #[must_use]
    pub fn cooldown_days(&self, price: f64) -> i32 {
        self.tiers
            .iter()
            .find(|tier| tier.max_price.is_none_or(|bound| price <= bound))
            .map_or(0, |tier| tier.days)
    }

    /// The configured tiers.
    #[must_use]
    pub fn tiers(&self) -> &[CooldownTier] {
        &self.tiers
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Input for a new wishlist item
#[derive(Debug, Clone)]
pub struct NewWishlistItem {
    /// What the user wants
    pub name: String,
    /// Expected price
    pub price: f64,
    /// Optional image
    pub image_url: Option<String>,
}

/// Partial update of a wishlist item
#[derive(Debug, Clone, Default)]
pub struct WishlistChanges {
    /// New name
    pub name: Option<String>,
    /// New price; recomputes the cooldown
    pub price: Option<f64>,
    /// New image
    pub image_url: Option<String>,
}

/// Adds an item to the wishlist with a cooldown derived from its price.
pub async fn create_item(
    db: &DatabaseConnection,
    user_id: i64,
    policy: &CooldownPolicy,
    new: NewWishlistItem,
) -> Result<wishlist_item::Model> {
    ensure_positive_amount(new.price)?;
    if new.name.trim().is_empty() {
        return Err(Error::invalid_state("Wishlist item name cannot be empty"));
    }
    find_user(db, user_id).await?;

    let cooldown_days = policy.cooldown_days(new.price);
    let item = wishlist_item::ActiveModel {
        user_id: Set(user_id),
        name: Set(new.name.trim().to_string()),
        price: Set(new.price),
        image_url: Set(new.image_url),
        cooldown_days: Set(cooldown_days),
        status: Set(WishlistStatus::Waiting),
        added_date: Set(Utc::now()),
        purchased_date: Set(None),
        removed_date: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        "Wishlist item {} for user {} waits {} days",
        item.id, user_id, cooldown_days
    );
    Ok(item)
}

async fn find_owned_item<C>(db: &C, user_id: i64, item_id: i64) -> Result<wishlist_item::Model>
where
    C: ConnectionTrait,
{
    WishlistItem::find_by_id(item_id)
        .filter(wishlist_item::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Wishlist item", item_id))
}

/// Retrieves one wishlist item.
pub async fn get_item(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
) -> Result<wishlist_item::Model> {
    find_owned_item(db, user_id, item_id).await
}

/// Lists the user's items, newest first, optionally only those in `status`.
pub async fn list_items(
    db: &DatabaseConnection,
    user_id: i64,
    status: Option<WishlistStatus>,
) -> Result<Vec<wishlist_item::Model>> {
    let mut query = WishlistItem::find().filter(wishlist_item::Column::UserId.eq(user_id));
    if let Some(status) = status {
        query = query.filter(wishlist_item::Column::Status.eq(status));
    }
    query
        .order_by_desc(wishlist_item::Column::AddedDate)
        .all(db)
        .await
        .map_err(Into::into)
}

fn ensure_open(item: &wishlist_item::Model) -> Result<()> {
    if item.status.is_terminal() {
        return Err(Error::invalid_state(format!(
            "Wishlist item {} is already {:?}",
            item.id, item.status
        )));
    }
    Ok(())
}

/// Edits a waiting or ready item.
///
/// A price change recomputes the cooldown from the original `added_date`, which can
/// send a ready item back to waiting.
pub async fn update_item(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
    policy: &CooldownPolicy,
    changes: WishlistChanges,
    now: DateTime<Utc>,
) -> Result<wishlist_item::Model> {
    if let Some(price) = changes.price {
        ensure_positive_amount(price)?;
    }

    let item = find_owned_item(db, user_id, item_id).await?;
    ensure_open(&item)?;

    let mut active_model: wishlist_item::ActiveModel = item.clone().into();
    if let Some(name) = changes.name {
        active_model.name = Set(name.trim().to_string());
    }
    if let Some(image_url) = changes.image_url {
        active_model.image_url = Set(Some(image_url));
    }
    if let Some(price) = changes.price {
        let cooldown_days = policy.cooldown_days(price);
        let waiting = wishlist_item::Model {
            cooldown_days,
            status: WishlistStatus::Waiting,
            ..item
        };
        let status = if waiting.days_remaining(now) > 0 {
            WishlistStatus::Waiting
        } else {
            WishlistStatus::Ready
        };
        active_model.price = Set(price);
        active_model.cooldown_days = Set(cooldown_days);
        active_model.status = Set(status);
    }

    active_model.update(db).await.map_err(Into::into)
}

/// Buys an item whose cooldown is over.
///
/// Books a transaction for the item's price (category defaults to `"Shopping"`,
/// note to `"Wishlist: <name>"`) through the ordinary transaction path and marks the
/// item purchased, all in one database transaction.
pub async fn purchase_item(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
    category: Option<String>,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<(wishlist_item::Model, transaction::Model)> {
    let txn = db.begin().await?;
    let item = find_owned_item(&txn, user_id, item_id).await?;
    ensure_open(&item)?;

    let days_remaining = item.days_remaining(now);
    if days_remaining > 0 {
        return Err(Error::invalid_state(format!(
            "Cooldown period not over, {days_remaining} days remaining"
        )));
    }

    let mut new = NewTransaction::new(
        item.price,
        category.unwrap_or_else(|| DEFAULT_PURCHASE_CATEGORY.to_string()),
    );
    new.date = Some(now);
    new.note = Some(note.unwrap_or_else(|| format!("Wishlist: {}", item.name)));
    let booked = insert_transaction(&txn, user_id, new).await?;

    let mut active_model: wishlist_item::ActiveModel = item.into();
    active_model.status = Set(WishlistStatus::Purchased);
    active_model.purchased_date = Set(Some(now));
    let purchased = active_model.update(&txn).await?;

    txn.commit().await?;
    info!(
        "User {} purchased wishlist item {} as transaction {}",
        user_id, purchased.id, booked.id
    );
    Ok((purchased, booked))
}

/// Abandons an item and counts it as an avoided impulse.
pub async fn remove_item(
    db: &DatabaseConnection,
    user_id: i64,
    item_id: i64,
    now: DateTime<Utc>,
) -> Result<wishlist_item::Model> {
    let txn = db.begin().await?;
    let item = find_owned_item(&txn, user_id, item_id).await?;
    ensure_open(&item)?;

    store_avoided_impulse(
        &txn,
        user_id,
        NewAvoidedImpulse {
            amount: item.price,
            category: ABANDONED_CATEGORY.to_string(),
            description: Some(item.name.clone()),
        },
        now,
    )
    .await?;

    let mut active_model: wishlist_item::ActiveModel = item.into();
    active_model.status = Set(WishlistStatus::Removed);
    active_model.removed_date = Set(Some(now));
    let removed = active_model.update(&txn).await?;

    txn.commit().await?;
    info!("User {} removed wishlist item {}", user_id, removed.id);
    Ok(removed)
}

/// Deletes an item outright, whatever its status.
pub async fn delete_item(db: &DatabaseConnection, user_id: i64, item_id: i64) -> Result<()> {
    let item = find_owned_item(db, user_id, item_id).await?;
    item.delete(db).await?;
    Ok(())
}

/// Moves every waiting item whose cooldown has elapsed to `ready`.
///
/// Returns the number of items promoted. Safe to run any number of times.
pub async fn promote_ready_items(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64> {
    let waiting = WishlistItem::find()
        .filter(wishlist_item::Column::Status.eq(WishlistStatus::Waiting))
        .all(db)
        .await?;

    let due: Vec<i64> = waiting
        .iter()
        .filter(|item| item.days_remaining(now) == 0)
        .map(|item| item.id)
        .collect();
    if due.is_empty() {
        return Ok(0);
    }

    let result = WishlistItem::update_many()
        .col_expr(
            wishlist_item::Column::Status,
            Expr::value(WishlistStatus::Ready),
        )
        .filter(wishlist_item::Column::Id.is_in(due))
        .filter(wishlist_item::Column::Status.eq(WishlistStatus::Waiting))
        .exec(db)
        .await?;

    info!("Promoted {} wishlist items to ready", result.rows_affected);
    Ok(result.rows_affected)
}
