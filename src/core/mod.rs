//! Core business logic - framework-agnostic services over the ledger store.
//!
//! Every public function takes an explicit database connection and, where the
//! result depends on the clock, an explicit `now`/`today` so that the scheduled
//! jobs and on-demand callers produce identical results for identical inputs.

pub mod calendar;
pub mod category_limit;
pub mod goal;
pub mod impulse;
pub mod income;
pub mod milestone;
pub mod monthly;
pub mod reflection;
pub mod report;
pub mod rollover;
pub mod streak;
pub mod transaction;
pub mod user;
pub mod wishlist;
