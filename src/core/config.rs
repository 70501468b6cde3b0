use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: econbot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "econbot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: econbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "econbot.log".to_string()));

/// Log level for terminal and file output
/// Read from LOG_LEVEL environment variable (error, warn, info, debug, trace)
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Port of the dashboard API and webhook server
/// Read from WEB_PORT environment variable
/// Default: 8080
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Public base URL Telegram reaches the webhook on, e.g. https://bots.example.com
/// Read from PUBLIC_URL environment variable
pub static PUBLIC_URL: Lazy<Option<String>> =
    Lazy::new(|| env::var("PUBLIC_URL").ok().map(|url| url.trim_end_matches('/').to_string()));

/// Custom Bot API server URL (local telegram-bot-api)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Animation sent with level-up notices
/// Read from LEVEL_UP_ANIMATION_URL environment variable
pub static LEVEL_UP_ANIMATION_URL: Lazy<String> = Lazy::new(|| {
    env::var("LEVEL_UP_ANIMATION_URL")
        .unwrap_or_else(|_| "https://media.giphy.com/media/g9582DNuQppxC/giphy.gif".to_string())
});

/// Economy rules
pub mod economy {
    use chrono::Duration;

    /// Wallet of a freshly created account
    pub const STARTING_BALANCE: u64 = 1_000;

    /// XP needed per level; level = xp / XP_PER_LEVEL + 1
    pub const XP_PER_LEVEL: u64 = 100;

    pub const DAILY_BASE: u64 = 1_000;
    pub const DAILY_PER_LEVEL: u64 = 200;

    /// `/work` base pay is drawn from [WORK_MIN, WORK_MAX)
    pub const WORK_MIN: u64 = 200;
    pub const WORK_MAX: u64 = 700;
    pub const WORK_PER_LEVEL: u64 = 50;
    pub const WORK_XP: u64 = 10;

    pub const CRIME_XP: u64 = 15;

    pub const ROB_SUCCESS_RATE: f64 = 0.5;
    /// Share of the wallet won or lost by `/rob`, in percent
    pub const ROB_SHARE_PERCENT: u64 = 30;
    pub const ROB_XP: u64 = 20;

    pub const GAMBLE_WIN_RATE: f64 = 0.45;

    pub const SLOTS_TRIPLE_MULTIPLIER: u32 = 10;
    pub const SLOTS_PAIR_MULTIPLIER: u32 = 2;

    /// XP for a group message is drawn from CHAT_XP_MIN..=CHAT_XP_MAX
    pub const CHAT_XP_MIN: u64 = 1;
    pub const CHAT_XP_MAX: u64 = 5;

    pub const LEADERBOARD_SIZE: usize = 10;

    pub fn daily_cooldown() -> Duration {
        Duration::hours(24)
    }

    pub fn work_cooldown() -> Duration {
        Duration::hours(1)
    }

    pub fn crime_cooldown() -> Duration {
        Duration::minutes(30)
    }

    pub fn rob_cooldown() -> Duration {
        Duration::hours(2)
    }
}

/// Dashboard plans and limits
pub mod plans {
    /// Bots an owner may create on the free plan
    pub const FREE_BOT_LIMIT: usize = 1;

    /// Bots an owner may create on the pro plan
    pub const PRO_BOT_LIMIT: usize = 5;

    /// Coin price of the pro plan
    pub const PRO_PRICE: u64 = 500;

    /// Coin price of the enterprise plan
    pub const ENTERPRISE_PRICE: u64 = 2_000;

    /// Rows returned by the transactions endpoint
    pub const TRANSACTION_PAGE: usize = 50;
}

pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

pub mod storage {
    /// Maximum pooled SQLite connections
    pub const POOL_SIZE: u32 = 10;
}

pub mod metrics {
    use once_cell::sync::Lazy;
    use std::env;

    /// Enable metrics collection and HTTP server
    /// Read from METRICS_ENABLED environment variable
    /// Default: true
    pub static ENABLED: Lazy<bool> = Lazy::new(|| {
        env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true)
    });

    /// Port for metrics HTTP server
    /// Read from METRICS_PORT environment variable
    /// Default: 9090
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090)
    });
}
