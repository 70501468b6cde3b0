//! SQLite persistence: connection pool, migrations and per-table queries

pub mod bots;
pub mod dashboard;
pub mod db;
pub mod economy;
pub mod migrations;
pub mod minigames;

// Re-exports for convenience
pub use db::{create_pool, get_connection, run_blocking, DbConnection, DbPool};
pub use economy::{EconomyStore, MemoryEconomyStore, Ranking, SqliteEconomyStore};
