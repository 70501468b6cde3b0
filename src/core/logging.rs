//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Parses a LOG_LEVEL value, falling back to `Info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = level_filter(&config::LOG_LEVEL);

    // Keep dependency chatter out of the logs
    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("r2d2")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup
pub fn log_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("DATABASE_PATH: {}", *config::DATABASE_PATH);
    log::info!("WEB_PORT: {}", *config::WEB_PORT);

    match config::PUBLIC_URL.as_deref() {
        Some(url) => log::info!("✅ PUBLIC_URL: {}", url),
        None => {
            log::warn!("⚠️  PUBLIC_URL: not set");
            log::warn!("   Webhooks cannot be registered until PUBLIC_URL points at this server");
        }
    }

    if let Some(api_url) = config::BOT_API_URL.as_deref() {
        log::info!("BOT_API_URL: {}", api_url);
    }

    if *config::metrics::ENABLED {
        log::info!("Metrics: enabled on port {}", *config::metrics::PORT);
    } else {
        log::info!("Metrics: disabled");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
