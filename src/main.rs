use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;

use econbot::cli::{Cli, Commands};
use econbot::core::{config, init_logger, log_configuration, metrics, metrics_server, Role};
use econbot::storage::{bots, create_pool, dashboard, run_blocking, DbPool, SqliteEconomyStore};
use econbot::telegram::ChatGateway;
use econbot::web::{self, bots::webhook_url, AppState};
use econbot::{EconomyService, TeloxideGateway};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the matching subcommand; without
/// one the server runs.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env before any config is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { port }) => run_server(port).await,
        Some(Commands::GrantAdmin { user_id }) => grant_admin(user_id).await,
        Some(Commands::SetWebhook { bot_id }) => set_webhook(bot_id).await,
        None => {
            log::info!("No command specified, running the server");
            run_server(None).await
        }
    }
}

fn open_database() -> Result<DbPool> {
    create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))
}

async fn run_server(port: Option<u16>) -> Result<()> {
    log_configuration();
    metrics::init_metrics();

    let pool = open_database()?;
    let store = Arc::new(SqliteEconomyStore::new(pool.clone()));
    let economy = EconomyService::new(store);
    let gateway: Arc<dyn ChatGateway> = Arc::new(TeloxideGateway::new());
    let state = AppState::new(pool, economy, gateway, config::PUBLIC_URL.clone());

    if *config::metrics::ENABLED {
        let metrics_port = *config::metrics::PORT;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(metrics_port).await {
                log::error!("Metrics server error: {}", e);
            }
        });
    } else {
        log::info!("Metrics collection disabled (METRICS_ENABLED=false)");
    }

    let port = port.unwrap_or(*config::WEB_PORT);
    tokio::select! {
        result = web::serve(port, state) => result,
        _ = signal::ctrl_c() => {
            log::info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

async fn grant_admin(user_id: String) -> Result<()> {
    let pool = open_database()?;
    let target = user_id.clone();
    let granted = run_blocking(&pool, move |conn| Ok(dashboard::grant_role(conn, &target, Role::Admin)?)).await?;
    if granted {
        log::info!("Granted admin role to {}", user_id);
    } else {
        log::info!("{} already has the admin role", user_id);
    }
    Ok(())
}

async fn set_webhook(bot_id: String) -> Result<()> {
    let base = config::PUBLIC_URL
        .clone()
        .ok_or_else(|| anyhow::anyhow!("PUBLIC_URL environment variable not set"))?;
    let pool = open_database()?;
    let id = bot_id.clone();
    let bot = run_blocking(&pool, move |conn| Ok(bots::get_bot(conn, &id)?))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Bot {} not found", bot_id))?;

    let url = webhook_url(&base, &bot.id);
    TeloxideGateway::new().set_webhook(&bot.token, &url).await?;
    log::info!("Webhook of bot {} set to {}", bot.id, url);
    Ok(())
}
