//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Every table except `system_state` is owned by a user.

pub mod avoided_impulse;
pub mod budget_rollover;
pub mod category_limit;
pub mod celebration;
pub mod goal;
pub mod income;
pub mod reflection;
pub mod system_state;
pub mod transaction;
pub mod user;
pub mod user_streak;
pub mod wishlist_item;

// Re-export specific types to avoid conflicts
pub use avoided_impulse::{Entity as AvoidedImpulse, Model as AvoidedImpulseModel};
pub use budget_rollover::{Entity as BudgetRollover, Model as BudgetRolloverModel};
pub use category_limit::{Entity as CategoryLimit, Model as CategoryLimitModel};
pub use celebration::{Entity as Celebration, Milestone, Model as CelebrationModel};
pub use goal::{Entity as Goal, Model as GoalModel};
pub use income::{Entity as Income, Model as IncomeModel};
pub use reflection::{Entity as Reflection, Model as ReflectionModel};
pub use system_state::{Entity as SystemState, Model as SystemStateModel};
pub use transaction::{Entity as Transaction, Model as TransactionModel};
pub use user::{Entity as User, Model as UserModel};
pub use user_streak::{Entity as UserStreak, Model as UserStreakModel};
pub use wishlist_item::{Entity as WishlistItem, Model as WishlistItemModel, WishlistStatus};
