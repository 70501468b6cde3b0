//! Dashboard REST API and the Telegram webhook endpoint.
//!
//! Runs on WEB_PORT (default 3000) alongside the internal metrics server.

pub mod bots;
pub mod dashboard;
mod error;
pub mod minigames;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::economy::EconomyService;
use crate::storage::DbPool;
use crate::telegram::{ChatGateway, WebhookHandler};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub gateway: Arc<dyn ChatGateway>,
    pub webhook: WebhookHandler,
    /// Base URL Telegram reaches this service at; needed to register webhooks.
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        economy: EconomyService,
        gateway: Arc<dyn ChatGateway>,
        public_url: Option<String>,
    ) -> Self {
        let webhook = WebhookHandler::new(pool.clone(), economy, Arc::clone(&gateway));
        Self {
            pool,
            gateway,
            webhook,
            public_url,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/telegram/webhook/{bot_id}", post(bots::telegram_webhook))
        .route("/api/bots", get(bots::list_bots).post(bots::create_bot))
        .route("/api/bots/{id}", axum::routing::patch(bots::update_bot).delete(bots::delete_bot))
        .route("/api/bots/{id}/stats", get(bots::bot_stats))
        .route("/api/bots/{id}/webhook", post(bots::register_webhook))
        .route("/api/minigames/{game_type}/session", get(minigames::latest_session))
        .route("/api/profiles", post(dashboard::create_profile))
        .route("/api/profiles/{user_id}", get(dashboard::get_profile))
        .route("/api/profiles/{user_id}/upgrade", post(dashboard::upgrade_plan))
        .route("/api/notifications", get(dashboard::list_notifications))
        .route("/api/notifications/{id}/read", post(dashboard::mark_read))
        .route("/api/transactions", get(dashboard::list_transactions))
        .route("/api/admin/overview", get(dashboard::admin_overview))
        .route("/api/admin/grant", post(dashboard::admin_grant))
        .route("/api/admin/broadcast", post(dashboard::admin_broadcast))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the public web server.
pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /api/telegram/webhook/{{bot_id}} - Telegram updates");
    log::info!("  /api/...                        - Dashboard API");
    log::info!("  /health                         - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}
