//! User streak entity - per-user gamification counters and the rollover budget.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User streak database model (one row per user)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_streaks")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner; at most one streak row per user
    #[sea_orm(unique)]
    pub user_id: i64,
    /// Consecutive days spent at or under the daily limit
    pub current_streak: i32,
    /// Highest `current_streak` ever reached
    pub longest_streak: i32,
    /// Number of purchases the user talked themselves out of
    pub impulses_avoided: i32,
    /// Unused budget carried forward, capped at three daily limits
    pub rollover_budget: f64,
    /// Last day the nightly evaluation processed for this user
    pub last_streak_date: Option<Date>,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `UserStreak` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each streak belongs to one user
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
