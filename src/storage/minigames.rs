//! Resolved minigame plays.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::economy::outcome::GameType;
use crate::storage::db::{decimal_at, format_timestamp, timestamp_at};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: String,
    pub bot_id: String,
    pub user_id: i64,
    pub game_type: String,
    pub score: u32,
    /// Signed wallet change of the play
    #[serde(with = "rust_decimal::serde::float")]
    pub coins_earned: Decimal,
    pub created_at: DateTime<Utc>,
}

pub fn insert_session(conn: &Connection, session: &GameSession) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO mini_game_sessions (id, bot_id, user_id, game_type, score, coins_earned, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            session.id,
            session.bot_id,
            session.user_id,
            session.game_type,
            session.score,
            session.coins_earned.to_string(),
            format_timestamp(session.created_at)
        ],
    )?;
    Ok(())
}

/// Newest session of a user for one game, optionally limited to one bot.
pub fn latest_session(
    conn: &Connection,
    user_id: i64,
    game: GameType,
    bot_id: Option<&str>,
) -> rusqlite::Result<Option<GameSession>> {
    conn.query_row(
        "SELECT id, bot_id, user_id, game_type, score, coins_earned, created_at
         FROM mini_game_sessions
         WHERE user_id = ?1 AND game_type = ?2 AND (?3 IS NULL OR bot_id = ?3)
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1",
        params![user_id, game.as_ref(), bot_id],
        |row| {
            Ok(GameSession {
                id: row.get(0)?,
                bot_id: row.get(1)?,
                user_id: row.get(2)?,
                game_type: row.get(3)?,
                score: row.get(4)?,
                coins_earned: decimal_at(row, 5)?,
                created_at: timestamp_at(row, 6)?,
            })
        },
    )
    .optional()
}
