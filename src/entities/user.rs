//! User entity - the owner of every other record.
//!
//! Holds the financial settings the daily limit is derived from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of days a month is assumed to have when deriving the daily limit.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Login e-mail, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Expected monthly income
    pub monthly_income: f64,
    /// Rent, subscriptions and other fixed monthly costs
    pub fixed_expenses: f64,
    /// IANA timezone name (e.g. `"Europe/Berlin"`), kept for display
    pub timezone: String,
    /// When the user was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Disposable income spread over a 30 day month, never negative.
    #[must_use]
    pub fn daily_limit(&self) -> f64 {
        daily_limit(self.monthly_income, self.fixed_expenses)
    }
}

/// `max(0, (monthly_income - fixed_expenses) / 30)`
#[must_use]
pub fn daily_limit(monthly_income: f64, fixed_expenses: f64) -> f64 {
    if monthly_income <= fixed_expenses {
        return 0.0;
    }
    (monthly_income - fixed_expenses) / DAYS_PER_MONTH
}

/// Children point at users through their own `belongs_to` relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
