//! Milestones and the celebration queue.
//!
//! Milestones are derived from the streak row. The first time one is reached a
//! celebration row is stored; clients pull unshown celebrations and mark them shown.

use crate::{
    entities::{Celebration, Milestone, celebration, user_streak},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashSet;
use tracing::info;

/// Every milestone, in display order.
pub const ALL_MILESTONES: [Milestone; 6] = [
    Milestone::Streak7,
    Milestone::Streak30,
    Milestone::Saved100,
    Milestone::Saved500,
    Milestone::Impulses5,
    Milestone::Impulses20,
];

/// Whether the streak row satisfies the milestone.
///
/// Savings milestones look at the accumulated rollover budget.
#[must_use]
pub fn is_reached(milestone: Milestone, streak: &user_streak::Model) -> bool {
    match milestone {
        Milestone::Streak7 => streak.current_streak >= 7,
        Milestone::Streak30 => streak.current_streak >= 30,
        Milestone::Saved100 => streak.rollover_budget >= 100.0,
        Milestone::Saved500 => streak.rollover_budget >= 500.0,
        Milestone::Impulses5 => streak.impulses_avoided >= 5,
        Milestone::Impulses20 => streak.impulses_avoided >= 20,
    }
}

/// Milestones currently satisfied by the streak row.
#[must_use]
pub fn reached_milestones(streak: &user_streak::Model) -> Vec<Milestone> {
    ALL_MILESTONES
        .into_iter()
        .filter(|m| is_reached(*m, streak))
        .collect()
}

/// Short message shown with a celebration.
#[must_use]
pub const fn message(milestone: Milestone) -> &'static str {
    match milestone {
        Milestone::Streak7 => "One full week under budget!",
        Milestone::Streak30 => "Thirty days under budget in a row!",
        Milestone::Saved100 => "You have rolled over 100 in savings!",
        Milestone::Saved500 => "500 saved through rollover!",
        Milestone::Impulses5 => "Five impulses resisted!",
        Milestone::Impulses20 => "Twenty impulses resisted!",
    }
}

/// Stores a celebration for each milestone the streak row satisfies that the user
/// has not been celebrated for yet. Returns the newly created celebrations.
pub async fn record_new_milestones<C>(
    db: &C,
    streak: &user_streak::Model,
) -> Result<Vec<celebration::Model>>
where
    C: ConnectionTrait,
{
    let reached = reached_milestones(streak);
    if reached.is_empty() {
        return Ok(Vec::new());
    }

    let existing: HashSet<Milestone> = Celebration::find()
        .filter(celebration::Column::UserId.eq(streak.user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.milestone)
        .collect();

    let mut created = Vec::new();
    for milestone in reached.into_iter().filter(|m| !existing.contains(m)) {
        let row = celebration::ActiveModel {
            user_id: Set(streak.user_id),
            milestone: Set(milestone),
            achieved_at: Set(Utc::now()),
            shown: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!("User {} reached milestone {:?}", streak.user_id, milestone);
        created.push(row);
    }
    Ok(created)
}

/// Celebrations not yet displayed, oldest first.
pub async fn pending_celebrations(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<celebration::Model>> {
    Celebration::find()
        .filter(celebration::Column::UserId.eq(user_id))
        .filter(celebration::Column::Shown.eq(false))
        .order_by_asc(celebration::Column::AchievedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All celebrations the user ever earned, newest first.
pub async fn list_celebrations(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<celebration::Model>> {
    Celebration::find()
        .filter(celebration::Column::UserId.eq(user_id))
        .order_by_desc(celebration::Column::AchievedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a celebration as displayed.
pub async fn mark_celebration_shown(
    db: &DatabaseConnection,
    user_id: i64,
    celebration_id: i64,
) -> Result<celebration::Model> {
    let celebration = Celebration::find_by_id(celebration_id)
        .filter(celebration::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Celebration", celebration_id))?;

    let mut active_model: celebration::ActiveModel = celebration.into();
    active_model.shown = Set(true);
    active_model.update(db).await.map_err(Into::into)
}
