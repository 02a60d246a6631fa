//! Wishlist item entity - something the user wants to buy after a cooling-off period.
//!
//! Items start `waiting`, become `ready` once `cooldown_days` have passed since
//! `added_date`, and end either `purchased` or `removed`.

use chrono::{Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Lifecycle status of a wishlist item
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum WishlistStatus {
    /// Cooldown still running
    #[sea_orm(string_value = "waiting")]
    Waiting,
    /// Cooldown elapsed, may be purchased
    #[sea_orm(string_value = "ready")]
    Ready,
    /// Bought; terminal
    #[sea_orm(string_value = "purchased")]
    Purchased,
    /// Abandoned by the user; terminal
    #[sea_orm(string_value = "removed")]
    Removed,
}

impl WishlistStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Purchased | Self::Removed)
    }
}

/// Wishlist item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wishlist_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the item
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// What the user wants to buy
    pub name: String,
    /// Expected price, always positive
    pub price: f64,
    /// Optional product image
    pub image_url: Option<String>,
    /// Waiting period derived from the price tier
    pub cooldown_days: i32,
    /// Current lifecycle status
    #[sea_orm(indexed)]
    pub status: WishlistStatus,
    /// When the item was added; the cooldown starts here
    pub added_date: DateTimeUtc,
    /// Set when the item is purchased
    pub purchased_date: Option<DateTimeUtc>,
    /// Set when the item is removed
    pub removed_date: Option<DateTimeUtc>,
}

impl Model {
    /// The moment the cooldown ends.
    #[must_use]
    pub fn ready_date(&self) -> DateTimeUtc {
        self.added_date + Duration::days(i64::from(self.cooldown_days))
    }

    /// Whole days left before the item may be bought, rounded up so that any
    /// time strictly before [`Model::ready_date`] reports at least one day.
    #[must_use]
    pub fn days_remaining(&self, now: chrono::DateTime<Utc>) -> i64 {
        if self.status == WishlistStatus::Ready {
            return 0;
        }
        let seconds = (self.ready_date() - now).num_seconds();
        if seconds <= 0 {
            return 0;
        }
        (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    }
}

/// Defines relationships between `WishlistItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
