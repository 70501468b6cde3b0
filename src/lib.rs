//! Econbot - multi-tenant Telegram economy bot
//!
//! Owners register bots through the dashboard API; every bot gets its own
//! webhook, and chat commands run against a per-bot virtual economy.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and metrics
//! - `economy`: command parsing, the pure command processor and the service
//!   that persists its transitions
//! - `storage`: SQLite pool, migrations and repositories
//! - `telegram`: Bot API gateway, update decoding and the webhook handler
//! - `web`: dashboard REST API and webhook routes

pub mod cli;
pub mod core;
pub mod economy;
pub mod storage;
pub mod telegram;
pub mod web;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use economy::EconomyService;
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{ChatGateway, TeloxideGateway, WebhookHandler};
pub use web::{router, AppState};
