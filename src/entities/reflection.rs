//! Reflection entity - the end-of-day journal entry, one per user per day.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reflection database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reflections")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Author of the reflection
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// The day reflected upon
    pub date: Date,
    /// A purchase the user regrets
    pub regret_purchase: Option<String>,
    /// A purchase the user is happy with
    pub good_purchase: Option<String>,
    /// Anything else
    pub notes: Option<String>,
    /// When the reflection was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Reflection and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each reflection belongs to one user
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
