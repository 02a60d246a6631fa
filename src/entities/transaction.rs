//! Transaction entity - money spent by a user.
//!
//! Each transaction carries a free-text category, a timestamp and an impulse flag.
//! Amounts are always positive; spending is implied.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the transaction
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Amount spent, always positive
    pub amount: f64,
    /// Free-text category label (e.g. `"Food & Dining"`)
    #[sea_orm(indexed)]
    pub category: String,
    /// When the money was spent
    #[sea_orm(indexed)]
    pub date: DateTimeUtc,
    /// Whether this was an unplanned, emotional purchase
    pub is_impulse: bool,
    /// Optional free-text note
    pub note: Option<String>,
    /// Reason given when overriding the emergency pause
    pub emergency_reason: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
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
