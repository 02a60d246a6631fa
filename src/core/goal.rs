//! Savings goals.

use crate::{
    core::user::find_user,
    entities::{Goal, goal},
    errors::{Error, Result, ensure_positive_amount},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Colour used when none is given.
pub const DEFAULT_GOAL_COLOR: &str = "bg-blue-500";

/// Input for a new goal
#[derive(Debug, Clone)]
pub struct NewGoal {
    /// Display name
    pub name: String,
    /// Amount to reach
    pub target: f64,
    /// Amount already saved
    pub current: f64,
    /// Display colour
    pub color: Option<String>,
    /// Optional deadline
    pub deadline: Option<NaiveDate>,
}

impl NewGoal {
    /// A goal starting from zero with the default colour and no deadline.
    pub fn new(name: impl Into<String>, target: f64) -> Self {
        Self {
            name: name.into(),
            target,
            current: 0.0,
            color: None,
            deadline: None,
        }
    }
}

/// Partial update of a goal
#[derive(Debug, Clone, Default)]
pub struct GoalChanges {
    /// New name
    pub name: Option<String>,
    /// New target
    pub target: Option<f64>,
    /// New current amount
    pub current: Option<f64>,
    /// New colour
    pub color: Option<String>,
    /// New deadline
    pub deadline: Option<NaiveDate>,
}

fn clamp_current(current: f64, target: f64) -> f64 {
    current.clamp(0.0, target)
}

/// Creates a goal. `current` is clamped to `[0, target]`.
pub async fn create_goal(
    db: &DatabaseConnection,
    user_id: i64,
    new: NewGoal,
) -> Result<goal::Model> {
    ensure_positive_amount(new.target)?;
    if new.name.trim().is_empty() {
        return Err(Error::invalid_state("Goal name cannot be empty"));
    }
    if !new.current.is_finite() {
        return Err(Error::InvalidAmount {
            amount: new.current,
        });
    }
    find_user(db, user_id).await?;

    let now = Utc::now();
    goal::ActiveModel {
        user_id: Set(user_id),
        name: Set(new.name.trim().to_string()),
        current: Set(clamp_current(new.current, new.target)),
        target: Set(new.target),
        color: Set(new.color.unwrap_or_else(|| DEFAULT_GOAL_COLOR.to_string())),
        deadline: Set(new.deadline),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Retrieves one of the user's goals.
pub async fn get_goal(db: &DatabaseConnection, user_id: i64, goal_id: i64) -> Result<goal::Model> {
    Goal::find_by_id(goal_id)
        .filter(goal::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Goal", goal_id))
}

/// Lists the user's goals, oldest first.
pub async fn list_goals(db: &DatabaseConnection, user_id: i64) -> Result<Vec<goal::Model>> {
    Goal::find()
        .filter(goal::Column::UserId.eq(user_id))
        .order_by_asc(goal::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update; `current` stays within `[0, target]`.
pub async fn update_goal(
    db: &DatabaseConnection,
    user_id: i64,
    goal_id: i64,
    changes: GoalChanges,
) -> Result<goal::Model> {
    if let Some(target) = changes.target {
        ensure_positive_amount(target)?;
    }
    let goal = get_goal(db, user_id, goal_id).await?;
    let target = changes.target.unwrap_or(goal.target);
    let current = changes.current.unwrap_or(goal.current);
    if !current.is_finite() {
        return Err(Error::InvalidAmount { amount: current });
    }

    let mut active_model: goal::ActiveModel = goal.into();
    if let Some(name) = changes.name {
        active_model.name = Set(name.trim().to_string());
    }
    if let Some(color) = changes.color {
        active_model.color = Set(color);
    }
    if let Some(deadline) = changes.deadline {
        active_model.deadline = Set(Some(deadline));
    }
    active_model.target = Set(target);
    active_model.current = Set(clamp_current(current, target));
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Adds `amount` (negative to withdraw) to the goal, clamped to `[0, target]`.
pub async fn add_progress(
    db: &DatabaseConnection,
    user_id: i64,
    goal_id: i64,
    amount: f64,
) -> Result<goal::Model> {
    if !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }
    let goal = get_goal(db, user_id, goal_id).await?;
    let current = clamp_current(goal.current + amount, goal.target);

    let mut active_model: goal::ActiveModel = goal.into();
    active_model.current = Set(current);
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Deletes a goal.
pub async fn delete_goal(db: &DatabaseConnection, user_id: i64, goal_id: i64) -> Result<()> {
    let goal = get_goal(db, user_id, goal_id).await?;
    goal.delete(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_goal_defaults() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let goal = create_goal(&db, user.id, NewGoal::new("Bike", 400.0)).await?;
        assert_eq!(goal.current, 0.0);
        assert_eq!(goal.color, DEFAULT_GOAL_COLOR);
        assert_eq!(goal.progress_percentage(), 0.0);

        let result = create_goal(&db, user.id, NewGoal::new("Nothing", 0.0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_progress_clamps() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let goal = create_goal(&db, user.id, NewGoal::new("Laptop", 1000.0)).await?;

        let goal = add_progress(&db, user.id, goal.id, 250.0).await?;
        assert_eq!(goal.current, 250.0);
        assert_eq!(goal.progress_percentage(), 25.0);

        let goal = add_progress(&db, user.id, goal.id, 5000.0).await?;
        assert_eq!(goal.current, 1000.0);
        assert_eq!(goal.progress_percentage(), 100.0);

        let goal = add_progress(&db, user.id, goal.id, -2000.0).await?;
        assert_eq!(goal.current, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_lowering_target_clamps_current() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let mut new = NewGoal::new("Trip", 500.0);
        new.current = 450.0;
        let goal = create_goal(&db, user.id, new).await?;

        let updated = update_goal(
            &db,
            user.id,
            goal.id,
            GoalChanges {
                target: Some(300.0),
                color: Some("bg-green-500".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.target, 300.0);
        assert_eq!(updated.current, 300.0);
        assert_eq!(updated.color, "bg-green-500");
        Ok(())
    }

    #[tokio::test]
    async fn test_goals_are_private() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let other = create_test_user(&db, "other").await?;
        let goal = create_goal(&db, user.id, NewGoal::new("Car", 9000.0)).await?;

        assert!(matches!(
            get_goal(&db, other.id, goal.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(list_goals(&db, other.id).await?.is_empty());

        delete_goal(&db, user.id, goal.id).await?;
        assert!(list_goals(&db, user.id).await?.is_empty());
        Ok(())
    }
}
