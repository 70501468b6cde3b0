//! Bots registered through the dashboard and their usage statistics.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};
use crate::core::types::Plan;
use crate::storage::db::{format_timestamp, timestamp_at};

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5,}:[A-Za-z0-9_-]{30,}$").unwrap());
static CHANNEL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{3,31}$").unwrap());

const MAX_NAME_LENGTH: usize = 64;

/// A Telegram bot managed by one dashboard owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    /// Channel users must join, stored without the leading `@`
    pub channel_username: Option<String>,
    pub bot_image_url: Option<String>,
    pub welcome_message: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bot {
    /// `https://t.me/<channel>` when the bot gates on a channel.
    pub fn channel_link(&self) -> Option<String> {
        self.channel_username
            .as_deref()
            .map(|channel| format!("https://t.me/{}", channel))
    }

    /// Chat id accepted by getChatMember for the gating channel.
    pub fn channel_chat(&self) -> Option<String> {
        self.channel_username.as_deref().map(|channel| format!("@{}", channel))
    }
}

/// Body of `POST /api/bots`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBot {
    pub user_id: String,
    pub name: String,
    pub telegram_token: String,
    #[serde(default)]
    pub channel_username: Option<String>,
    #[serde(default)]
    pub bot_image_url: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

/// Body of `PATCH /api/bots/{id}`; absent fields stay unchanged and an
/// empty string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotUpdate {
    pub name: Option<String>,
    pub telegram_token: Option<String>,
    pub channel_username: Option<String>,
    pub bot_image_url: Option<String>,
    pub welcome_message: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "name must be 1 to {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_token(token: &str) -> AppResult<()> {
    if !TOKEN_PATTERN.is_match(token.trim()) {
        return Err(AppError::Validation("telegramToken is not a valid bot token".to_string()));
    }
    Ok(())
}

/// Strips `@` and checks the username; an empty value means "no channel".
fn normalize_channel(channel: &str) -> AppResult<Option<String>> {
    let channel = channel.trim().trim_start_matches('@');
    if channel.is_empty() {
        return Ok(None);
    }
    if let Some(rest) = channel.strip_prefix("https://t.me/") {
        return normalize_channel(rest);
    }
    if !CHANNEL_PATTERN.is_match(channel) {
        return Err(AppError::Validation(format!("'{}' is not a valid channel username", channel)));
    }
    Ok(Some(channel.to_string()))
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl NewBot {
    /// Validates the request and normalizes the channel username.
    pub fn validated(mut self) -> AppResult<Self> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        validate_name(&self.name)?;
        validate_token(&self.telegram_token)?;
        self.name = self.name.trim().to_string();
        self.telegram_token = self.telegram_token.trim().to_string();
        self.channel_username = match self.channel_username.as_deref() {
            Some(channel) => normalize_channel(channel)?,
            None => None,
        };
        self.bot_image_url = blank_to_none(self.bot_image_url.as_deref());
        self.welcome_message = blank_to_none(self.welcome_message.as_deref());
        Ok(self)
    }
}

impl BotUpdate {
    pub fn validated(mut self) -> AppResult<Self> {
        if let Some(name) = &self.name {
            validate_name(name)?;
            self.name = Some(name.trim().to_string());
        }
        if let Some(token) = &self.telegram_token {
            validate_token(token)?;
            self.telegram_token = Some(token.trim().to_string());
        }
        if let Some(channel) = &self.channel_username {
            self.channel_username = Some(normalize_channel(channel)?.unwrap_or_default());
        }
        Ok(self)
    }
}

/// Usage counters of one bot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStats {
    pub bot_id: String,
    pub total_users: i64,
    pub total_groups: i64,
    pub total_commands: i64,
    pub plan: Plan,
    pub bot_username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Increments applied to [`BotStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub users: i64,
    pub groups: i64,
    pub commands: i64,
}

impl StatsDelta {
    pub fn command() -> Self {
        Self {
            commands: 1,
            ..Self::default()
        }
    }

    pub fn new_user() -> Self {
        Self {
            users: 1,
            ..Self::default()
        }
    }

    pub fn new_group() -> Self {
        Self {
            groups: 1,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const BOT_COLUMNS: &str = "id, owner_id, name, token, channel_username, image_url, welcome_message, is_active, created_at, updated_at";

fn bot_from_row(row: &Row<'_>) -> rusqlite::Result<Bot> {
    Ok(Bot {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        token: row.get(3)?,
        channel_username: row.get(4)?,
        bot_image_url: row.get(5)?,
        welcome_message: row.get(6)?,
        is_active: row.get(7)?,
        created_at: timestamp_at(row, 8)?,
        updated_at: timestamp_at(row, 9)?,
    })
}

/// Inserts a bot and its stats row; the stats plan mirrors the owner's plan.
pub fn create_bot(conn: &mut Connection, new: &NewBot, id: &str, now: DateTime<Utc>) -> AppResult<Bot> {
    let stamp = format_timestamp(now);
    let plan: Plan = conn
        .query_row("SELECT plan FROM profiles WHERE user_id = ?1", [&new.user_id], |row| row.get(0))
        .optional()?
        .unwrap_or_default();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO bots (id, owner_id, name, token, channel_username, image_url, welcome_message, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
        params![
            id,
            new.user_id,
            new.name,
            new.telegram_token,
            new.channel_username,
            new.bot_image_url,
            new.welcome_message,
            stamp
        ],
    )?;
    tx.execute(
        "INSERT INTO bot_stats (bot_id, plan, bot_username, updated_at) VALUES (?1, ?2, NULL, ?3)",
        params![id, plan, stamp],
    )?;
    tx.commit()?;

    get_bot(conn, id)?.ok_or_else(|| AppError::NotFound(format!("bot {}", id)))
}

pub fn get_bot(conn: &Connection, id: &str) -> rusqlite::Result<Option<Bot>> {
    conn.query_row(
        &format!("SELECT {} FROM bots WHERE id = ?1", BOT_COLUMNS),
        [id],
        bot_from_row,
    )
    .optional()
}

/// Bots of one owner, newest first.
pub fn list_bots(conn: &Connection, owner_id: &str) -> rusqlite::Result<Vec<Bot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bots WHERE owner_id = ?1 ORDER BY created_at DESC, id",
        BOT_COLUMNS
    ))?;
    let rows = stmt.query_map([owner_id], bot_from_row)?;
    rows.collect()
}

pub fn count_bots(conn: &Connection, owner_id: &str) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM bots WHERE owner_id = ?1", [owner_id], |row| row.get(0))
}

pub fn count_all_bots(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM bots", [], |row| row.get(0))
}

/// Applies a partial update. Returns `false` when the bot does not exist.
pub fn update_bot(conn: &Connection, id: &str, update: &BotUpdate, now: DateTime<Utc>) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE bots SET
            name = COALESCE(?2, name),
            token = COALESCE(?3, token),
            channel_username = CASE WHEN ?4 IS NULL THEN channel_username ELSE NULLIF(?4, '') END,
            image_url = CASE WHEN ?5 IS NULL THEN image_url ELSE NULLIF(?5, '') END,
            welcome_message = CASE WHEN ?6 IS NULL THEN welcome_message ELSE NULLIF(?6, '') END,
            is_active = COALESCE(?7, is_active),
            updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            update.name,
            update.telegram_token,
            update.channel_username,
            update.bot_image_url,
            update.welcome_message,
            update.is_active,
            format_timestamp(now)
        ],
    )?;
    Ok(changed > 0)
}

/// Deletes a bot; stats, economy rows and sessions cascade.
pub fn delete_bot(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM bots WHERE id = ?1", [id])? > 0)
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<BotStats> {
    Ok(BotStats {
        bot_id: row.get(0)?,
        total_users: row.get(1)?,
        total_groups: row.get(2)?,
        total_commands: row.get(3)?,
        plan: row.get(4)?,
        bot_username: row.get(5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

/// Stats of a bot, creating the row when it is missing.
pub fn ensure_stats(conn: &Connection, bot_id: &str, now: DateTime<Utc>) -> rusqlite::Result<BotStats> {
    conn.execute(
        "INSERT OR IGNORE INTO bot_stats (bot_id, updated_at) VALUES (?1, ?2)",
        params![bot_id, format_timestamp(now)],
    )?;
    conn.query_row(
        "SELECT bot_id, total_users, total_groups, total_commands, plan, bot_username, updated_at
         FROM bot_stats WHERE bot_id = ?1",
        [bot_id],
        stats_from_row,
    )
}

pub fn set_bot_username(conn: &Connection, bot_id: &str, username: &str, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE bot_stats SET bot_username = ?2, updated_at = ?3 WHERE bot_id = ?1",
        params![bot_id, username, format_timestamp(now)],
    )?;
    Ok(())
}

pub fn bump_stats(conn: &Connection, bot_id: &str, delta: StatsDelta, now: DateTime<Utc>) -> rusqlite::Result<()> {
    if delta.is_empty() {
        return Ok(());
    }
    let stamp = format_timestamp(now);
    conn.execute(
        "INSERT OR IGNORE INTO bot_stats (bot_id, updated_at) VALUES (?1, ?2)",
        params![bot_id, stamp],
    )?;
    conn.execute(
        "UPDATE bot_stats SET
            total_users = total_users + ?2,
            total_groups = total_groups + ?3,
            total_commands = total_commands + ?4,
            updated_at = ?5
         WHERE bot_id = ?1",
        params![bot_id, delta.users, delta.groups, delta.commands, stamp],
    )?;
    Ok(())
}

/// Records a group chat; `true` the first time the bot sees it.
pub fn remember_group(conn: &Connection, bot_id: &str, chat_id: i64) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO known_chats (bot_id, chat_id) VALUES (?1, ?2)",
        params![bot_id, chat_id],
    )?;
    Ok(inserted > 0)
}
