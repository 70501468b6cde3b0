use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use super::AppState;
use crate::core::error::{AppError, AppResult};
use crate::economy::outcome::GameType;
use crate::storage::minigames::{self, GameSession};
use crate::storage::run_blocking;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub user_id: Option<i64>,
    pub bot_id: Option<String>,
}

/// Latest round of a minigame for a Telegram user, or `null`.
pub async fn latest_session(
    State(state): State<AppState>,
    Path(game_type): Path<String>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<Option<GameSession>>> {
    let game = GameType::from_str(&game_type.to_lowercase())
        .map_err(|_| AppError::Validation(format!("unknown game type '{}'", game_type)))?;
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("userId required".to_string()))?;
    let bot_id = query.bot_id.filter(|id| !id.trim().is_empty());

    let session = run_blocking(&state.pool, move |conn| {
        Ok(minigames::latest_session(conn, user_id, game, bot_id.as_deref())?)
    })
    .await?;
    Ok(Json(session))
}
