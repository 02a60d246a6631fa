//! Database configuration module for budget-streak.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Composite uniqueness rules that an
//! entity attribute cannot express (one reflection per user and day, one ledger row per
//! user and day, one limit per user, category and window) are added as explicit indexes.

use crate::entities::{
    AvoidedImpulse, BudgetRollover, CategoryLimit, Celebration, Goal, Income, Reflection,
    SystemState, Transaction, User, UserStreak, WishlistItem, budget_rollover, category_limit,
    celebration, reflection,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::debug;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget_streak.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    ensure_sqlite_dir(&database_url)?;
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
///
/// `users` is created first because every other table references it.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, Income).await?;
    create_table(db, &schema, CategoryLimit).await?;
    create_table(db, &schema, Goal).await?;
    create_table(db, &schema, WishlistItem).await?;
    create_table(db, &schema, UserStreak).await?;
    create_table(db, &schema, BudgetRollover).await?;
    create_table(db, &schema, Reflection).await?;
    create_table(db, &schema, AvoidedImpulse).await?;
    create_table(db, &schema, Celebration).await?;
    create_table(db, &schema, SystemState).await?;

    let composite_indexes = [
        unique_index(
            "idx_reflections_user_date",
            Reflection,
            &[reflection::Column::UserId, reflection::Column::Date],
        ),
        unique_index(
            "idx_budget_rollovers_user_date",
            BudgetRollover,
            &[budget_rollover::Column::UserId, budget_rollover::Column::Date],
        ),
        unique_index(
            "idx_category_limits_user_category_window",
            CategoryLimit,
            &[
                category_limit::Column::UserId,
                category_limit::Column::Category,
                category_limit::Column::ResetDate,
            ],
        ),
        unique_index(
            "idx_celebrations_user_milestone",
            Celebration,
            &[celebration::Column::UserId, celebration::Column::Milestone],
        ),
    ];

    let builder = db.get_database_backend();
    for index in &composite_indexes {
        db.execute(builder.build(index)).await?;
    }

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

fn unique_index<E, C>(name: &str, entity: E, columns: &[C]) -> IndexCreateStatement
where
    E: EntityTrait,
    C: sea_orm::ColumnTrait,
{
    let mut index = Index::create();
    index.name(name).table(entity).unique().if_not_exists();
    for column in columns {
        index.col(*column);
    }
    index
}
