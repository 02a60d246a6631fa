//! Celebration entity - a milestone the user reached, queued for display.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Milestones that trigger a celebration
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// Seven day streak
    #[sea_orm(string_value = "streak_7")]
    Streak7,
    /// Thirty day streak
    #[sea_orm(string_value = "streak_30")]
    Streak30,
    /// 100 in rollover savings
    #[sea_orm(string_value = "saved_100")]
    Saved100,
    /// 500 in rollover savings
    #[sea_orm(string_value = "saved_500")]
    Saved500,
    /// Five impulses avoided
    #[sea_orm(string_value = "impulses_5")]
    Impulses5,
    /// Twenty impulses avoided
    #[sea_orm(string_value = "impulses_20")]
    Impulses20,
}

/// Celebration database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "celebrations")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Who reached the milestone
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Which milestone was reached
    pub milestone: Milestone,
    /// When it was first detected
    pub achieved_at: DateTimeUtc,
    /// Whether a client already displayed it
    pub shown: bool,
}

/// Defines relationships between Celebration and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each celebration belongs to one user
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
