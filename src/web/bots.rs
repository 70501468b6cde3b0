//! `/api/bots` endpoints and the Telegram webhook route.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::AppState;
use crate::core::error::{AppError, AppResult};
use crate::storage::bots::{self, Bot, BotStats, BotUpdate, NewBot};
use crate::storage::dashboard;
use crate::core::metrics;
use crate::storage::run_blocking;
use crate::telegram::webhook::require_active_bot;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

pub(super) fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} required", name)))
}

async fn load_bot(state: &AppState, id: String) -> AppResult<Bot> {
    run_blocking(&state.pool, move |conn| {
        bots::get_bot(conn, &id)?.ok_or_else(|| AppError::NotFound(format!("bot {} not found", id)))
    })
    .await
}

pub async fn list_bots(State(state): State<AppState>, Query(query): Query<OwnerQuery>) -> AppResult<Json<Vec<Bot>>> {
    let owner = required(query.user_id, "userId")?;
    let bots = run_blocking(&state.pool, move |conn| Ok(bots::list_bots(conn, &owner)?)).await?;
    Ok(Json(bots))
}

/// Creates a bot. Owners with a profile are held to their plan's bot limit.
pub async fn create_bot(
    State(state): State<AppState>,
    Json(body): Json<NewBot>,
) -> AppResult<(StatusCode, Json<Bot>)> {
    let new = body.validated()?;
    let bot = run_blocking(&state.pool, move |conn| {
        if let Some(profile) = dashboard::get_profile(conn, &new.user_id)? {
            if let Some(limit) = profile.plan.bot_limit() {
                let owned = bots::count_bots(conn, &new.user_id)?;
                if owned >= limit {
                    return Err(AppError::Forbidden(format!(
                        "The {} plan allows {} bot(s); upgrade to create more",
                        profile.plan.display_name(),
                        limit
                    )));
                }
            }
        }
        let id = Uuid::new_v4().to_string();
        bots::create_bot(conn, &new, &id, Utc::now())
    })
    .await?;
    log::info!("Created bot {} ({}) for owner {}", bot.id, bot.name, bot.owner_id);
    Ok((StatusCode::CREATED, Json(bot)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotOverview {
    pub bot: Bot,
    pub stats: BotStats,
    pub direct_link: String,
}

/// Bot, its stats and a `t.me` link resolved through getMe.
pub async fn bot_stats(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<BotOverview>> {
    let bot = load_bot(&state, id).await?;

    let username = match state.gateway.bot_username(&bot.token).await {
        Ok(username) => Some(username),
        Err(e) => {
            log::warn!("getMe for bot {} failed: {}", bot.id, e);
            None
        }
    };

    let bot_id = bot.id.clone();
    let known = username.clone();
    let stats = run_blocking(&state.pool, move |conn| {
        let now = Utc::now();
        if let Some(username) = &known {
            bots::ensure_stats(conn, &bot_id, now)?;
            bots::set_bot_username(conn, &bot_id, username, now)?;
        }
        Ok(bots::ensure_stats(conn, &bot_id, now)?)
    })
    .await?;

    let direct_link = username
        .map(|username| format!("https://t.me/{}", username))
        .unwrap_or_default();
    Ok(Json(BotOverview {
        bot,
        stats,
        direct_link,
    }))
}

pub async fn update_bot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BotUpdate>,
) -> AppResult<Json<Bot>> {
    let update = body.validated()?;
    let (previous_token, bot) = run_blocking(&state.pool, move |conn| {
        let previous = bots::get_bot(conn, &id)?.ok_or_else(|| AppError::NotFound(format!("bot {} not found", id)))?;
        if !bots::update_bot(conn, &id, &update, Utc::now())? {
            return Err(AppError::NotFound(format!("bot {} not found", id)));
        }
        let bot = bots::get_bot(conn, &id)?.ok_or_else(|| AppError::NotFound(format!("bot {} not found", id)))?;
        Ok((previous.token, bot))
    })
    .await?;
    if previous_token != bot.token {
        log::info!("Token of bot {} replaced", bot.id);
        state.gateway.forget(&previous_token);
    }
    Ok(Json(bot))
}

pub async fn delete_bot(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let bot = run_blocking(&state.pool, move |conn| {
        let bot = bots::get_bot(conn, &id)?.ok_or_else(|| AppError::NotFound(format!("bot {} not found", id)))?;
        if !bots::delete_bot(conn, &id)? {
            return Err(AppError::NotFound(format!("bot {} not found", id)));
        }
        Ok(bot)
    })
    .await?;
    state.gateway.forget(&bot.token);
    log::info!("Deleted bot {}", bot.id);
    Ok(Json(json!({ "ok": true })))
}

/// Points the bot's Telegram webhook at this service.
pub async fn register_webhook(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let base = state
        .public_url
        .clone()
        .ok_or_else(|| AppError::Validation("PUBLIC_URL is not configured".to_string()))?;
    let bot = load_bot(&state, id).await?;
    let url = webhook_url(&base, &bot.id);
    state.gateway.set_webhook(&bot.token, &url).await?;
    log::info!("Webhook of bot {} set to {}", bot.id, url);
    Ok(Json(json!({ "ok": true, "url": url })))
}

pub fn webhook_url(base: &str, bot_id: &str) -> String {
    format!("{}/api/telegram/webhook/{}", base.trim_end_matches('/'), bot_id)
}

/// Telegram delivery endpoint. Known active bots always get `{ok: true}`,
/// whatever the body holds.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let bot = require_active_bot(&state.webhook, &bot_id).await?;
    match serde_json::from_slice::<teloxide::types::Update>(&body) {
        Ok(update) => state.webhook.dispatch(&bot, &update).await,
        Err(e) => {
            log::warn!("Undecodable update for bot {}: {}", bot_id, e);
            metrics::record_webhook_update("undecodable");
        }
    }
    Ok(Json(json!({ "ok": true })))
}
