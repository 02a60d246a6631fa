//! Shared test utilities for budget-streak.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

use crate::{
    core::{
        transaction::{self, NewTransaction},
        user,
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test user with sensible defaults.
///
/// # Defaults
/// * `email`: `"{name}@example.com"`
/// * `monthly_income`: 3000.0
/// * `fixed_expenses`: 1500.0 (a daily limit of 50.0)
/// * `timezone`: `"UTC"`
pub async fn create_test_user(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::user::Model> {
    user::create_user(
        db,
        name.to_string(),
        format!("{name}@example.com"),
        3000.0,
        1500.0,
        None,
    )
    .await
}

/// Sets up a complete test environment with one user.
/// Returns (db, user) for common test scenarios.
pub async fn setup_with_user() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, "tester").await?;
    Ok((db, user))
}

/// Creates a planned transaction dated now.
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    category: &str,
    amount: f64,
) -> Result<entities::transaction::Model> {
    transaction::create_transaction(db, user_id, NewTransaction::new(amount, category)).await
}

/// Creates a planned `"Food"` transaction at the given instant.
pub async fn create_dated_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    amount: f64,
    date: DateTime<Utc>,
) -> Result<entities::transaction::Model> {
    let mut new = NewTransaction::new(amount, "Food");
    new.date = Some(date);
    transaction::create_transaction(db, user_id, new).await
}
