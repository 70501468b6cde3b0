//! Runs economy commands against the store.
//!
//! Every mutation of a record happens under the per-user lock: load, run the
//! pure processor, persist only the changed fields.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::command::EconomyCommand;
use super::dice::Dice;
use super::locks::UserLocks;
use super::outcome::{CommandError, Effect, Outcome};
use super::processor::{self, Transition};
use super::record::{EconomyPatch, EconomyRecord};
use crate::core::config::economy::LEADERBOARD_SIZE;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::storage::bots::StatsDelta;
use crate::storage::economy::{EconomyStore, Ranking};
use crate::storage::minigames::GameSession;

/// Randomness shared by all commands of the service.
pub type SharedDice = Arc<Mutex<Box<dyn Dice + Send>>>;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Outcome shown to the user, or why the command was rejected.
pub type CommandResult = Result<Outcome, CommandError>;

#[derive(Clone)]
pub struct EconomyService {
    store: Arc<dyn EconomyStore>,
    locks: UserLocks,
    dice: SharedDice,
    clock: Clock,
}

impl EconomyService {
    /// Service drawing randomness from an OS-seeded generator.
    pub fn new(store: Arc<dyn EconomyStore>) -> Self {
        let dice: Box<dyn Dice + Send> = Box::new(StdRng::from_entropy());
        Self::with_dice(store, dice)
    }

    pub fn with_dice(store: Arc<dyn EconomyStore>, dice: Box<dyn Dice + Send>) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
            dice: Arc::new(Mutex::new(dice)),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock, e.g. to step over cooldowns in tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn EconomyStore> {
        &self.store
    }

    fn roll<T>(&self, f: impl FnOnce(&mut dyn Dice) -> T) -> T {
        let mut dice = self.dice.lock().unwrap_or_else(PoisonError::into_inner);
        f(dice.as_mut())
    }

    /// Loads the record, creating it with starting values on first use.
    /// Caller must hold the user's lock.
    async fn open_locked(&self, bot_id: &str, user_id: i64) -> AppResult<EconomyRecord> {
        if let Some(record) = self.store.get(bot_id, user_id).await? {
            return Ok(record);
        }
        let (record, created) = self.store.create(EconomyRecord::new(bot_id, user_id)).await?;
        if created {
            log::info!("Opened economy account for user {} on bot {}", user_id, bot_id);
            metrics::ACCOUNTS_CREATED_TOTAL.inc();
            self.bump_stats(bot_id, StatsDelta::new_user()).await;
        }
        Ok(record)
    }

    /// Record of a user, created on first use.
    pub async fn open_account(&self, bot_id: &str, user_id: i64) -> AppResult<EconomyRecord> {
        let _guard = self.locks.lock(bot_id, user_id).await;
        self.open_locked(bot_id, user_id).await
    }

    /// Counts a command that does not go through [`Self::execute`]
    /// (help, leaderboard, malformed arguments...).
    pub async fn count_command(&self, bot_id: &str, name: &str, outcome: &str) {
        metrics::record_command(name, outcome);
        self.bump_stats(bot_id, StatsDelta::command()).await;
    }

    /// Bot statistics are bookkeeping; a failed bump is logged and the
    /// already committed command still answers.
    async fn bump_stats(&self, bot_id: &str, delta: StatsDelta) {
        if let Err(e) = self.store.bump_stats(bot_id, delta).await {
            log::warn!("Failed to update stats of bot {}: {}", bot_id, e);
        }
    }

    /// Runs one economy command for `user_id`.
    ///
    /// Rejections come back as `Ok(Err(..))` and never write; `Err` means
    /// storage failed.
    pub async fn execute(&self, bot_id: &str, user_id: i64, command: &EconomyCommand) -> AppResult<CommandResult> {
        let result = self.execute_locked(bot_id, user_id, command).await;
        let label = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(rejection)) => rejection.kind(),
            Err(_) => "error",
        };
        metrics::record_command(command.name(), label);
        self.bump_stats(bot_id, StatsDelta::command()).await;
        result
    }

    async fn execute_locked(&self, bot_id: &str, user_id: i64, command: &EconomyCommand) -> AppResult<CommandResult> {
        let _guard = match command.counterparty() {
            Some(other) => self.locks.lock_pair(bot_id, user_id, other).await,
            None => self.locks.lock(bot_id, user_id).await,
        };

        if let Some(receiver) = command.counterparty() {
            if receiver != user_id && self.store.get(bot_id, receiver).await?.is_none() {
                return Ok(Err(receiver_missing()));
            }
        }

        let record = self.open_locked(bot_id, user_id).await?;
        let now = (self.clock)();
        let transition = match self.roll(|dice| processor::process(&record, command, now, dice)) {
            Ok(transition) => transition,
            Err(rejection) => {
                log::debug!(
                    "Rejected /{} for user {} on bot {}: {}",
                    command.name(),
                    user_id,
                    bot_id,
                    rejection
                );
                return Ok(Err(rejection));
            }
        };

        match self.persist(&record, &transition).await {
            Ok(()) => {}
            Err(AppError::NotFound(_)) if command.counterparty().is_some() => return Ok(Err(receiver_missing())),
            Err(e) => return Err(e),
        }

        if let Some(level) = transition.outcome.level_up {
            log::info!("User {} reached level {} on bot {}", user_id, level, bot_id);
            metrics::LEVEL_UPS_TOTAL.inc();
        }
        Ok(Ok(transition.outcome))
    }

    async fn persist(&self, before: &EconomyRecord, transition: &Transition) -> AppResult<()> {
        let patch = EconomyPatch::diff(before, &transition.record);
        let credit = transition.effects.iter().find_map(|effect| match effect {
            Effect::Credit { user_id, amount } => Some((*user_id, *amount)),
            _ => None,
        });
        match credit {
            Some((receiver, amount)) => {
                self.store
                    .transfer(&before.bot_id, before.user_id, &patch, receiver, amount)
                    .await?
            }
            None => self.store.update(&before.bot_id, before.user_id, &patch).await?,
        }

        for effect in &transition.effects {
            if let Effect::GamePlayed { game, net, score, .. } = effect {
                metrics::record_game(game.as_ref(), *net > Decimal::ZERO);
                let session = GameSession {
                    id: Uuid::new_v4().to_string(),
                    bot_id: before.bot_id.clone(),
                    user_id: before.user_id,
                    game_type: game.to_string(),
                    score: *score,
                    coins_earned: *net,
                    created_at: (self.clock)(),
                };
                // The record is already committed; the session is history only
                if let Err(e) = self.store.record_game(session).await {
                    log::warn!(
                        "Failed to record {} session of user {} on bot {}: {}",
                        game,
                        before.user_id,
                        before.bot_id,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// XP for a non-command group message. Only existing accounts earn XP;
    /// returns the level-up outcome when the message crossed a level.
    pub async fn chat_activity(&self, bot_id: &str, user_id: i64) -> AppResult<Option<Outcome>> {
        let _guard = self.locks.lock(bot_id, user_id).await;
        let Some(record) = self.store.get(bot_id, user_id).await? else {
            return Ok(None);
        };
        let transition = self.roll(|dice| processor::award_chat_xp(&record, dice));
        let patch = EconomyPatch::diff(&record, &transition.record);
        self.store.update(bot_id, user_id, &patch).await?;

        Ok(transition.outcome.level_up.map(|level| {
            log::info!("User {} reached level {} on bot {} by chatting", user_id, level, bot_id);
            metrics::LEVEL_UPS_TOTAL.inc();
            transition.outcome
        }))
    }

    /// Records a group chat the first time it is seen.
    pub async fn track_group(&self, bot_id: &str, chat_id: i64) -> AppResult<()> {
        if self.store.remember_group(bot_id, chat_id).await? {
            log::info!("Bot {} joined group {}", bot_id, chat_id);
            self.bump_stats(bot_id, StatsDelta::new_group()).await;
        }
        Ok(())
    }

    pub async fn leaderboard(&self, bot_id: &str) -> AppResult<Vec<EconomyRecord>> {
        self.store.top_by_net_worth(bot_id, LEADERBOARD_SIZE).await
    }

    /// Record and rank of a user, opening the account first so a newcomer
    /// has a rank.
    pub async fn rank(&self, bot_id: &str, user_id: i64) -> AppResult<(EconomyRecord, Ranking)> {
        let record = self.open_account(bot_id, user_id).await?;
        let ranking = self
            .store
            .rank_of(bot_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("economy record {}/{}", bot_id, user_id)))?;
        Ok((record, ranking))
    }
}

fn receiver_missing() -> CommandError {
    CommandError::NotFound("❌ User not found! They need to use the bot first.".to_string())
}
