//! Goal entity - a savings target with a running amount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Goal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the goal
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Goal name (e.g. "Emergency fund")
    pub name: String,
    /// Amount saved so far, within `[0, target]`
    pub current: f64,
    /// Amount to reach, always positive
    pub target: f64,
    /// CSS color class used by clients
    pub color: String,
    /// Optional date the goal should be reached by
    pub deadline: Option<Date>,
    /// When the goal was created
    pub created_at: DateTimeUtc,
    /// When the goal was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Progress towards the target as a percentage (0-100).
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.target > 0.0 {
            (self.current / self.target * 100.0).min(100.0)
        } else {
            0.0
        }
    }
}

/// Defines relationships between Goal and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each goal belongs to one user
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
