//! Persistent economy records, one per (bot, Telegram user).
//!
//! The [`EconomyStore`] trait is the seam between the economy service and
//! storage. [`SqliteEconomyStore`] backs production; [`MemoryEconomyStore`]
//! keeps everything in process for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::core::error::{AppError, AppResult};
use crate::economy::catalog::{Job, ShopItem};
use crate::economy::record::{EconomyPatch, EconomyRecord, Inventory};
use crate::storage::bots::{self, StatsDelta};
use crate::storage::db::{decimal_at, format_timestamp, optional_timestamp_at, run_blocking, DbPool};
use crate::storage::minigames::{self, GameSession};

/// Leaderboard position of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    /// 1-based; ties share the better rank
    pub rank: usize,
    pub total: usize,
    pub net_worth: Decimal,
}

#[async_trait]
pub trait EconomyStore: Send + Sync {
    async fn get(&self, bot_id: &str, user_id: i64) -> AppResult<Option<EconomyRecord>>;

    /// Inserts `defaults` unless the record exists. Returns the stored record
    /// and whether it was created by this call.
    async fn create(&self, defaults: EconomyRecord) -> AppResult<(EconomyRecord, bool)>;

    /// Writes the `Some` fields of `patch`.
    async fn update(&self, bot_id: &str, user_id: i64, patch: &EconomyPatch) -> AppResult<()>;

    /// Applies the sender patch and credits `amount` to the receiver in one
    /// transaction. Fails with `NotFound` when the receiver has no record.
    async fn transfer(
        &self,
        bot_id: &str,
        sender_id: i64,
        sender_patch: &EconomyPatch,
        receiver_id: i64,
        amount: Decimal,
    ) -> AppResult<()>;

    /// Richest records by balance + bank, ties broken by user id.
    async fn top_by_net_worth(&self, bot_id: &str, limit: usize) -> AppResult<Vec<EconomyRecord>>;

    async fn rank_of(&self, bot_id: &str, user_id: i64) -> AppResult<Option<Ranking>>;

    async fn record_game(&self, session: GameSession) -> AppResult<()>;

    async fn bump_stats(&self, bot_id: &str, delta: StatsDelta) -> AppResult<()>;

    /// `true` the first time a group chat is seen for the bot.
    async fn remember_group(&self, bot_id: &str, chat_id: i64) -> AppResult<bool>;
}

fn encode_inventory(inventory: &Inventory) -> AppResult<String> {
    let keyed: BTreeMap<&str, u32> = inventory.iter().map(|(item, count)| (item.as_ref(), *count)).collect();
    serde_json::to_string(&keyed).map_err(|e| AppError::Anyhow(e.into()))
}

fn decode_inventory(raw: &str) -> Inventory {
    let keyed: BTreeMap<String, u32> = match serde_json::from_str(raw) {
        Ok(keyed) => keyed,
        Err(e) => {
            log::warn!("Unreadable inventory '{}': {}", raw, e);
            return Inventory::new();
        }
    };
    keyed
        .into_iter()
        .filter_map(|(key, count)| match key.parse::<ShopItem>() {
            Ok(item) => Some((item, count)),
            Err(_) => {
                log::warn!("Skipping unknown inventory item '{}'", key);
                None
            }
        })
        .collect()
}

fn decode_job(raw: Option<String>) -> Option<Job> {
    let raw = raw?;
    match raw.parse() {
        Ok(job) => Some(job),
        Err(_) => {
            log::warn!("Ignoring unknown job '{}'", raw);
            None
        }
    }
}

const RECORD_COLUMNS: &str = "bot_id, user_id, balance, bank, xp, level, inventory, job, \
     last_daily, last_work, last_crime, last_rob, total_messages";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EconomyRecord> {
    let inventory: String = row.get(6)?;
    Ok(EconomyRecord {
        bot_id: row.get(0)?,
        user_id: row.get(1)?,
        balance: decimal_at(row, 2)?,
        bank: decimal_at(row, 3)?,
        xp: row.get(4)?,
        level: row.get(5)?,
        inventory: decode_inventory(&inventory),
        job: decode_job(row.get(7)?),
        last_daily: optional_timestamp_at(row, 8)?,
        last_work: optional_timestamp_at(row, 9)?,
        last_crime: optional_timestamp_at(row, 10)?,
        last_rob: optional_timestamp_at(row, 11)?,
        total_messages: row.get(12)?,
    })
}

fn select_record(conn: &Connection, bot_id: &str, user_id: i64) -> rusqlite::Result<Option<EconomyRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM user_economy WHERE bot_id = ?1 AND user_id = ?2",
            RECORD_COLUMNS
        ),
        params![bot_id, user_id],
        record_from_row,
    )
    .optional()
}

fn int_value(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Builds `SET` assignments for the fields present in `patch`.
fn assignments(patch: &EconomyPatch) -> AppResult<Vec<(&'static str, Value)>> {
    let mut sets: Vec<(&'static str, Value)> = Vec::new();
    if let Some(balance) = patch.balance {
        sets.push(("balance", Value::Text(balance.to_string())));
    }
    if let Some(bank) = patch.bank {
        sets.push(("bank", Value::Text(bank.to_string())));
    }
    if let Some(xp) = patch.xp {
        sets.push(("xp", int_value(xp)));
    }
    if let Some(level) = patch.level {
        sets.push(("level", Value::Integer(i64::from(level))));
    }
    if let Some(inventory) = &patch.inventory {
        sets.push(("inventory", Value::Text(encode_inventory(inventory)?)));
    }
    if let Some(job) = patch.job {
        sets.push(("job", Value::Text(job.as_ref().to_string())));
    }
    let stamps = [
        ("last_daily", patch.last_daily),
        ("last_work", patch.last_work),
        ("last_crime", patch.last_crime),
        ("last_rob", patch.last_rob),
    ];
    for (column, at) in stamps {
        if let Some(at) = at {
            sets.push((column, Value::Text(format_timestamp(at))));
        }
    }
    if let Some(total) = patch.total_messages {
        sets.push(("total_messages", int_value(total)));
    }
    Ok(sets)
}

/// Runs the patch as one `UPDATE`; returns the number of matched rows.
fn apply_patch(conn: &Connection, bot_id: &str, user_id: i64, patch: &EconomyPatch) -> AppResult<usize> {
    let mut sets = assignments(patch)?;
    if sets.is_empty() {
        return Ok(0);
    }
    sets.push(("updated_at", Value::Text(format_timestamp(Utc::now()))));

    let clause = sets
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE user_economy SET {} WHERE bot_id = ?{} AND user_id = ?{}",
        clause,
        sets.len() + 1,
        sets.len() + 2
    );
    let mut values: Vec<Value> = sets.into_iter().map(|(_, value)| value).collect();
    values.push(Value::Text(bot_id.to_string()));
    values.push(Value::Integer(user_id));

    Ok(conn.execute(&sql, params_from_iter(values))?)
}

/// SQLite-backed store; every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteEconomyStore {
    pool: DbPool,
}

impl SqliteEconomyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EconomyStore for SqliteEconomyStore {
    async fn get(&self, bot_id: &str, user_id: i64) -> AppResult<Option<EconomyRecord>> {
        let bot_id = bot_id.to_string();
        run_blocking(&self.pool, move |conn| Ok(select_record(conn, &bot_id, user_id)?)).await
    }

    async fn create(&self, defaults: EconomyRecord) -> AppResult<(EconomyRecord, bool)> {
        run_blocking(&self.pool, move |conn| {
            let stamp = format_timestamp(Utc::now());
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_economy
                    (bot_id, user_id, balance, bank, xp, level, inventory, job, total_messages, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    defaults.bot_id,
                    defaults.user_id,
                    defaults.balance.to_string(),
                    defaults.bank.to_string(),
                    defaults.xp,
                    defaults.level,
                    encode_inventory(&defaults.inventory)?,
                    defaults.job.map(|job| job.as_ref().to_string()),
                    defaults.total_messages,
                    stamp
                ],
            )?;
            let record = select_record(conn, &defaults.bot_id, defaults.user_id)?.ok_or_else(|| {
                AppError::NotFound(format!("economy record {}/{}", defaults.bot_id, defaults.user_id))
            })?;
            Ok((record, inserted > 0))
        })
        .await
    }

    async fn update(&self, bot_id: &str, user_id: i64, patch: &EconomyPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let bot_id = bot_id.to_string();
        let patch = patch.clone();
        run_blocking(&self.pool, move |conn| {
            if apply_patch(conn, &bot_id, user_id, &patch)? == 0 {
                return Err(AppError::NotFound(format!("economy record {}/{}", bot_id, user_id)));
            }
            Ok(())
        })
        .await
    }

    async fn transfer(
        &self,
        bot_id: &str,
        sender_id: i64,
        sender_patch: &EconomyPatch,
        receiver_id: i64,
        amount: Decimal,
    ) -> AppResult<()> {
        let bot_id = bot_id.to_string();
        let sender_patch = sender_patch.clone();
        run_blocking(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let receiver = select_record(&tx, &bot_id, receiver_id)?
                .ok_or_else(|| AppError::NotFound(format!("economy record {}/{}", bot_id, receiver_id)))?;
            if apply_patch(&tx, &bot_id, sender_id, &sender_patch)? == 0 {
                return Err(AppError::NotFound(format!("economy record {}/{}", bot_id, sender_id)));
            }
            let credit = EconomyPatch {
                balance: Some(receiver.balance + amount),
                ..EconomyPatch::default()
            };
            apply_patch(&tx, &bot_id, receiver_id, &credit)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn top_by_net_worth(&self, bot_id: &str, limit: usize) -> AppResult<Vec<EconomyRecord>> {
        let bot_id = bot_id.to_string();
        run_blocking(&self.pool, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM user_economy WHERE bot_id = ?1
                 ORDER BY CAST(balance AS REAL) + CAST(bank AS REAL) DESC, user_id ASC
                 LIMIT ?2",
                RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map(params![bot_id, limit], record_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn rank_of(&self, bot_id: &str, user_id: i64) -> AppResult<Option<Ranking>> {
        let bot_id = bot_id.to_string();
        run_blocking(&self.pool, move |conn| {
            let Some(record) = select_record(conn, &bot_id, user_id)? else {
                return Ok(None);
            };
            let (ahead, total): (usize, usize) = conn.query_row(
                "SELECT
                    COALESCE(SUM(CAST(balance AS REAL) + CAST(bank AS REAL) > CAST(?2 AS REAL)), 0),
                    COUNT(*)
                 FROM user_economy WHERE bot_id = ?1",
                params![bot_id, record.net_worth().to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(Some(Ranking {
                rank: ahead + 1,
                total,
                net_worth: record.net_worth(),
            }))
        })
        .await
    }

    async fn record_game(&self, session: GameSession) -> AppResult<()> {
        run_blocking(&self.pool, move |conn| Ok(minigames::insert_session(conn, &session)?)).await
    }

    async fn bump_stats(&self, bot_id: &str, delta: StatsDelta) -> AppResult<()> {
        let bot_id = bot_id.to_string();
        run_blocking(&self.pool, move |conn| Ok(bots::bump_stats(conn, &bot_id, delta, Utc::now())?)).await
    }

    async fn remember_group(&self, bot_id: &str, chat_id: i64) -> AppResult<bool> {
        let bot_id = bot_id.to_string();
        run_blocking(&self.pool, move |conn| Ok(bots::remember_group(conn, &bot_id, chat_id)?)).await
    }
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<(String, i64), EconomyRecord>,
    sessions: Vec<GameSession>,
    stats: HashMap<String, StatsDelta>,
    groups: HashSet<(String, i64)>,
}

/// In-process store; the lock is never held across an `.await`.
#[derive(Default)]
pub struct MemoryEconomyStore {
    state: Mutex<MemoryState>,
}

impl MemoryEconomyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a record as-is, replacing any existing one.
    pub fn insert(&self, record: EconomyRecord) {
        self.state()
            .records
            .insert((record.bot_id.clone(), record.user_id), record);
    }

    pub fn record(&self, bot_id: &str, user_id: i64) -> Option<EconomyRecord> {
        self.state().records.get(&(bot_id.to_string(), user_id)).cloned()
    }

    pub fn sessions(&self) -> Vec<GameSession> {
        self.state().sessions.clone()
    }

    /// Accumulated stats increments of a bot.
    pub fn stats(&self, bot_id: &str) -> StatsDelta {
        self.state().stats.get(bot_id).copied().unwrap_or_default()
    }

    fn ranked(state: &MemoryState, bot_id: &str) -> Vec<EconomyRecord> {
        let mut records: Vec<EconomyRecord> = state
            .records
            .values()
            .filter(|record| record.bot_id == bot_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.net_worth().cmp(&a.net_worth()).then(a.user_id.cmp(&b.user_id)));
        records
    }
}

fn missing(bot_id: &str, user_id: i64) -> AppError {
    AppError::NotFound(format!("economy record {}/{}", bot_id, user_id))
}

#[async_trait]
impl EconomyStore for MemoryEconomyStore {
    async fn get(&self, bot_id: &str, user_id: i64) -> AppResult<Option<EconomyRecord>> {
        Ok(self.record(bot_id, user_id))
    }

    async fn create(&self, defaults: EconomyRecord) -> AppResult<(EconomyRecord, bool)> {
        let mut state = self.state();
        let key = (defaults.bot_id.clone(), defaults.user_id);
        if let Some(existing) = state.records.get(&key) {
            return Ok((existing.clone(), false));
        }
        state.records.insert(key, defaults.clone());
        Ok((defaults, true))
    }

    async fn update(&self, bot_id: &str, user_id: i64, patch: &EconomyPatch) -> AppResult<()> {
        let mut state = self.state();
        let record = state
            .records
            .get_mut(&(bot_id.to_string(), user_id))
            .ok_or_else(|| missing(bot_id, user_id))?;
        patch.apply(record);
        Ok(())
    }

    async fn transfer(
        &self,
        bot_id: &str,
        sender_id: i64,
        sender_patch: &EconomyPatch,
        receiver_id: i64,
        amount: Decimal,
    ) -> AppResult<()> {
        let mut state = self.state();
        let sender_key = (bot_id.to_string(), sender_id);
        let receiver_key = (bot_id.to_string(), receiver_id);
        if !state.records.contains_key(&receiver_key) {
            return Err(missing(bot_id, receiver_id));
        }
        let sender = state.records.get_mut(&sender_key).ok_or_else(|| missing(bot_id, sender_id))?;
        sender_patch.apply(sender);
        if let Some(receiver) = state.records.get_mut(&receiver_key) {
            receiver.balance += amount;
        }
        Ok(())
    }

    async fn top_by_net_worth(&self, bot_id: &str, limit: usize) -> AppResult<Vec<EconomyRecord>> {
        let state = self.state();
        Ok(Self::ranked(&state, bot_id).into_iter().take(limit).collect())
    }

    async fn rank_of(&self, bot_id: &str, user_id: i64) -> AppResult<Option<Ranking>> {
        let state = self.state();
        let ranked = Self::ranked(&state, bot_id);
        let Some(record) = ranked.iter().find(|record| record.user_id == user_id) else {
            return Ok(None);
        };
        let net_worth = record.net_worth();
        let ahead = ranked.iter().filter(|other| other.net_worth() > net_worth).count();
        Ok(Some(Ranking {
            rank: ahead + 1,
            total: ranked.len(),
            net_worth,
        }))
    }

    async fn record_game(&self, session: GameSession) -> AppResult<()> {
        self.state().sessions.push(session);
        Ok(())
    }

    async fn bump_stats(&self, bot_id: &str, delta: StatsDelta) -> AppResult<()> {
        let mut state = self.state();
        let entry = state.stats.entry(bot_id.to_string()).or_default();
        entry.users += delta.users;
        entry.groups += delta.groups;
        entry.commands += delta.commands;
        Ok(())
    }

    async fn remember_group(&self, bot_id: &str, chat_id: i64) -> AppResult<bool> {
        Ok(self.state().groups.insert((bot_id.to_string(), chat_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bots::{create_bot, ensure_stats, NewBot};
    use crate::storage::db::test_support::temp_pool;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sqlite_store() -> (TempDir, DbPool, SqliteEconomyStore) {
        let (dir, pool) = temp_pool();
        let mut conn = pool.get().unwrap();
        let bot = NewBot {
            user_id: "owner".to_string(),
            name: "Bot".to_string(),
            telegram_token: "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw".to_string(),
            channel_username: None,
            bot_image_url: None,
            welcome_message: None,
        };
        create_bot(&mut conn, &bot, "bot-1", Utc::now()).unwrap();
        drop(conn);
        let store = SqliteEconomyStore::new(pool.clone());
        (dir, pool, store)
    }

    fn rich(user_id: i64, balance: i64, bank: i64) -> EconomyRecord {
        let mut record = EconomyRecord::new("bot-1", user_id);
        record.balance = Decimal::from(balance);
        record.bank = Decimal::from(bank);
        record
    }

    async fn exercise_store(store: &dyn EconomyStore) {
        let (created, fresh) = store.create(EconomyRecord::new("bot-1", 1)).await.unwrap();
        assert!(fresh);
        assert_eq!(created.balance, Decimal::from(1_000));
        let (again, fresh) = store.create(rich(1, 5, 5)).await.unwrap();
        assert!(!fresh);
        assert_eq!(again, created);

        let mut inventory = Inventory::new();
        inventory.insert(ShopItem::Gun, 2);
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        let patch = EconomyPatch {
            balance: Some(Decimal::new(125_050, 2)),
            xp: Some(150),
            level: Some(2),
            inventory: Some(inventory.clone()),
            job: Some(Job::Janitor),
            last_work: Some(at),
            ..EconomyPatch::default()
        };
        store.update("bot-1", 1, &patch).await.unwrap();
        let stored = store.get("bot-1", 1).await.unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::new(125_050, 2));
        assert_eq!(stored.bank, Decimal::ZERO);
        assert_eq!((stored.xp, stored.level), (150, 2));
        assert_eq!(stored.inventory, inventory);
        assert_eq!(stored.job, Some(Job::Janitor));
        assert_eq!(stored.last_work, Some(at));
        assert_eq!(stored.last_daily, None);

        assert!(matches!(
            store.update("bot-1", 99, &patch).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.get("bot-1", 99).await.unwrap().is_none());
    }

    async fn exercise_ranking(store: &dyn EconomyStore) {
        store.create(rich(10, 500, 0)).await.unwrap();
        store.create(rich(11, 100, 900)).await.unwrap();
        store.create(rich(12, 2_000, 0)).await.unwrap();
        store.create(rich(13, 200, 0)).await.unwrap();

        let top: Vec<i64> = store
            .top_by_net_worth("bot-1", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(top, vec![12, 11, 10]);

        let ranking = store.rank_of("bot-1", 10).await.unwrap().unwrap();
        assert_eq!(ranking, Ranking { rank: 3, total: 4, net_worth: Decimal::from(500) });
        assert!(store.rank_of("bot-1", 77).await.unwrap().is_none());
    }

    async fn exercise_transfer(store: &dyn EconomyStore) {
        store.create(rich(20, 800, 0)).await.unwrap();
        store.create(rich(21, 50, 0)).await.unwrap();

        let debit = EconomyPatch {
            balance: Some(Decimal::from(500)),
            ..EconomyPatch::default()
        };
        store.transfer("bot-1", 20, &debit, 21, Decimal::from(300)).await.unwrap();
        let sender = store.get("bot-1", 20).await.unwrap().unwrap();
        let receiver = store.get("bot-1", 21).await.unwrap().unwrap();
        assert_eq!(sender.balance + receiver.balance, Decimal::from(850));
        assert_eq!(receiver.balance, Decimal::from(350));

        let result = store.transfer("bot-1", 20, &debit, 404, Decimal::from(1)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.get("bot-1", 20).await.unwrap().unwrap().balance, Decimal::from(500));
    }

    #[tokio::test]
    async fn test_sqlite_store_crud() {
        let (_dir, _pool, store) = sqlite_store();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        exercise_store(&MemoryEconomyStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_ranking() {
        let (_dir, _pool, store) = sqlite_store();
        exercise_ranking(&store).await;
    }

    #[tokio::test]
    async fn test_memory_ranking() {
        exercise_ranking(&MemoryEconomyStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_transfer_is_atomic() {
        let (_dir, _pool, store) = sqlite_store();
        exercise_transfer(&store).await;
    }

    #[tokio::test]
    async fn test_memory_transfer() {
        exercise_transfer(&MemoryEconomyStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_stats_and_unknown_inventory_keys() {
        let (_dir, pool, store) = sqlite_store();
        store.bump_stats("bot-1", StatsDelta::command()).await.unwrap();
        assert!(store.remember_group("bot-1", -5).await.unwrap());
        assert!(!store.remember_group("bot-1", -5).await.unwrap());

        store.create(EconomyRecord::new("bot-1", 3)).await.unwrap();
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE user_economy SET inventory = '{\"gun\":1,\"spaceship\":4}' WHERE user_id = 3",
            [],
        )
        .unwrap();
        let stats = ensure_stats(&conn, "bot-1", Utc::now()).unwrap();
        assert_eq!(stats.total_commands, 1);
        drop(conn);

        let record = store.get("bot-1", 3).await.unwrap().unwrap();
        assert_eq!(record.inventory.get(&ShopItem::Gun), Some(&1));
        assert_eq!(record.inventory.len(), 1);
    }
}
