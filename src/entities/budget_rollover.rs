//! Budget rollover entity - append-only ledger of daily rollover credits.
//!
//! At most one row per (user, day); the unique index is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget rollover database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_rollovers")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the ledger row
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// The evaluated day
    pub date: Date,
    /// Daily limit minus spending that day
    pub unused_amount: f64,
    /// Portion of `unused_amount` credited after applying the cap
    pub rollover_amount: f64,
    /// Whether any credit was made (false when the cap was already reached)
    pub applied: bool,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BudgetRollover` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ledger row belongs to one user
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
