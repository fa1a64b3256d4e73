//! # ch-infra
//!
//! Infrastructure adapters for cliphoard: the Diesel/SQLite implementation
//! of the history repository port, and the system clock.

pub mod db;
pub mod time;

pub use db::pool::{init_db_pool, DbPool};
pub use db::repository::DieselHistoryRepository;
pub use time::SystemClock;
