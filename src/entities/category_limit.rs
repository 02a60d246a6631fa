//! Category limit entity - a monthly spending cap for one category.
//!
//! One row covers one (user, category, month) window. `reset_date` is the first
//! day of the month after the window, i.e. the day `spent` next goes back to zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category limit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "category_limits")]
pub struct Model {
    /// Unique identifier for the limit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the limit
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Category label the cap applies to
    pub category: String,
    /// Monthly cap
    pub monthly_limit: f64,
    /// Running total spent in the current window
    pub spent: f64,
    /// Day the running total is next zeroed
    pub reset_date: Date,
    /// When the limit was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Budget left in this window, never negative.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.monthly_limit - self.spent).max(0.0)
    }

    /// Share of the cap already used, capped at 100.
    #[must_use]
    pub fn percentage_used(&self) -> f64 {
        if self.monthly_limit > 0.0 {
            (self.spent / self.monthly_limit * 100.0).min(100.0)
        } else {
            0.0
        }
    }
}

/// Defines relationships between `CategoryLimit` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each limit belongs to one user
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
