//! Metrics collection using Prometheus
//!
//! Tracks command usage and outcomes, webhook traffic, membership gating,
//! level-ups, minigame plays and dashboard errors.

use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, HistogramVec};

// ======================
// ECONOMY METRICS
// ======================

lazy_static! {
    /// Commands handled
    /// Labels: command (balance/work/...), outcome (ok/validation/precondition/cooldown/not_found/error)
    pub static ref COMMANDS_TOTAL: CounterVec = register_counter_vec!(
        "econbot_commands_total",
        "Total number of commands handled by outcome",
        &["command", "outcome"]
    )
    .unwrap();

    /// Accounts created lazily on first contact
    pub static ref ACCOUNTS_CREATED_TOTAL: Counter = register_counter!(
        "econbot_accounts_created_total",
        "Total number of economy accounts created"
    )
    .unwrap();

    /// Level-ups reached through any XP source
    pub static ref LEVEL_UPS_TOTAL: Counter = register_counter!(
        "econbot_level_ups_total",
        "Total number of level-ups"
    )
    .unwrap();

    /// Minigame rounds
    /// Labels: game (slots/gamble), result (win/loss)
    pub static ref GAMES_PLAYED_TOTAL: CounterVec = register_counter_vec!(
        "econbot_games_played_total",
        "Total number of minigame rounds by result",
        &["game", "result"]
    )
    .unwrap();
}

// ======================
// WEBHOOK METRICS
// ======================

lazy_static! {
    /// Inbound updates
    /// Labels: kind (message/callback/ignored)
    pub static ref WEBHOOK_UPDATES_TOTAL: CounterVec = register_counter_vec!(
        "econbot_webhook_updates_total",
        "Total number of webhook updates received",
        &["kind"]
    )
    .unwrap();

    /// Commands refused because the user has not joined the bot's channel
    pub static ref MEMBERSHIP_DENIED_TOTAL: Counter = register_counter!(
        "econbot_membership_denied_total",
        "Total number of commands denied by channel membership gating"
    )
    .unwrap();

    /// Failed Bot API calls
    /// Labels: method (sendMessage/getChatMember/...)
    pub static ref UPSTREAM_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "econbot_upstream_errors_total",
        "Total number of failed chat platform calls",
        &["method"]
    )
    .unwrap();

    /// Webhook processing time
    /// Labels: kind (message/callback)
    pub static ref WEBHOOK_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "econbot_webhook_duration_seconds",
        "Time spent processing one webhook update",
        &["kind"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .unwrap();
}

// ======================
// DASHBOARD METRICS
// ======================

lazy_static! {
    /// Dashboard API errors
    /// Labels: category (validation/not_found/forbidden/conflict/database/upstream/internal)
    pub static ref API_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "econbot_api_errors_total",
        "Total number of dashboard API errors by category",
        &["category"]
    )
    .unwrap();
}

/// Initialize metrics (call this at startup to register all metrics)
pub fn init_metrics() {
    log::info!("Initializing metrics registry...");

    let _ = &*COMMANDS_TOTAL;
    let _ = &*ACCOUNTS_CREATED_TOTAL;
    let _ = &*LEVEL_UPS_TOTAL;
    let _ = &*GAMES_PLAYED_TOTAL;
    let _ = &*WEBHOOK_UPDATES_TOTAL;
    let _ = &*MEMBERSHIP_DENIED_TOTAL;
    let _ = &*UPSTREAM_ERRORS_TOTAL;
    let _ = &*WEBHOOK_DURATION_SECONDS;
    let _ = &*API_ERRORS_TOTAL;

    // Pre-create common label sets so they show up with 0 values
    for kind in ["message", "callback", "ignored"] {
        WEBHOOK_UPDATES_TOTAL.with_label_values(&[kind]);
    }
    for game in ["slots", "gamble"] {
        GAMES_PLAYED_TOTAL.with_label_values(&[game, "win"]);
        GAMES_PLAYED_TOTAL.with_label_values(&[game, "loss"]);
    }

    log::info!("Metrics registry initialized");
}

/// Helper function to record a handled command
pub fn record_command(command: &str, outcome: &str) {
    COMMANDS_TOTAL.with_label_values(&[command, outcome]).inc();
}

/// Helper function to record a minigame round
pub fn record_game(game: &str, won: bool) {
    let result = if won { "win" } else { "loss" };
    GAMES_PLAYED_TOTAL.with_label_values(&[game, result]).inc();
}

/// Helper function to record an inbound webhook update
pub fn record_webhook_update(kind: &str) {
    WEBHOOK_UPDATES_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper function to record a failed Bot API call
pub fn record_upstream_error(method: &str) {
    UPSTREAM_ERRORS_TOTAL.with_label_values(&[method]).inc();
}

/// Helper function to record a dashboard API error
pub fn record_api_error(category: &str) {
    API_ERRORS_TOTAL.with_label_values(&[category]).inc();
}
