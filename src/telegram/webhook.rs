//! Per-bot webhook: turns Telegram updates into economy commands and replies.
//!
//! Failures while handling an update are logged and swallowed; Telegram only
//! ever sees `{ok: true}` for a known bot so it does not redeliver.

use std::sync::Arc;

use chrono::Utc;
use teloxide::types::Update;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::economy::outcome::callbacks;
use crate::economy::{Command, EconomyService, Invocation, Outcome};
use crate::storage::bots::{self, Bot};
use crate::storage::{run_blocking, DbPool};
use crate::telegram::gateway::{ChatGateway, Outbound};
use crate::telegram::texts;
use crate::telegram::update::{event_of, CallbackEvent, ChatEvent, Event};

#[derive(Clone)]
pub struct WebhookHandler {
    pool: DbPool,
    economy: EconomyService,
    gateway: Arc<dyn ChatGateway>,
}

impl WebhookHandler {
    pub fn new(pool: DbPool, economy: EconomyService, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { pool, economy, gateway }
    }

    /// The bot if it exists and is active.
    pub async fn active_bot(&self, bot_id: &str) -> AppResult<Option<Bot>> {
        let bot_id = bot_id.to_string();
        let bot = run_blocking(&self.pool, move |conn| Ok(bots::get_bot(conn, &bot_id)?)).await?;
        Ok(bot.filter(|bot| bot.is_active))
    }

    /// Handles one update for `bot`; never fails.
    pub async fn dispatch(&self, bot: &Bot, update: &Update) {
        let event = event_of(update);
        let kind = match &event {
            Some(Event::Chat(_)) => "message",
            Some(Event::Callback(_)) => "callback",
            None => "ignored",
        };
        metrics::record_webhook_update(kind);
        let _timer = metrics::WEBHOOK_DURATION_SECONDS.with_label_values(&[kind]).start_timer();

        let result = match event {
            Some(Event::Chat(chat)) => self.on_message(bot, chat).await,
            Some(Event::Callback(callback)) => self.on_callback(bot, callback).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            log::error!("Webhook update for bot {} failed: {}", bot.id, e);
        }
    }

    async fn on_message(&self, bot: &Bot, event: ChatEvent) -> AppResult<()> {
        if !event.is_private {
            self.economy.track_group(&bot.id, event.chat_id).await?;
        }

        let invocation = match Invocation::parse(&event.text) {
            Some(invocation) => invocation,
            None if event.is_private => return Ok(()),
            None => return self.on_chatter(bot, &event).await,
        };
        if invocation.mention.is_some() && !self.addressed_to(bot, &invocation).await {
            log::debug!(
                "Bot {} ignoring command for @{}",
                bot.id,
                invocation.mention.as_deref().unwrap_or_default()
            );
            return Ok(());
        }
        let parsed = invocation.command;

        let gated = !matches!(parsed, Ok(Command::Start));
        if gated && !self.passes_gate(bot, event.user_id).await {
            metrics::MEMBERSHIP_DENIED_TOTAL.inc();
            return self.reply(bot, event.chat_id, texts::join_prompt(bot)).await;
        }

        let command = match parsed {
            Ok(command) => command,
            Err(rejection) => {
                self.economy.count_command(&bot.id, "invalid", rejection.kind()).await;
                return self.reply(bot, event.chat_id, Outcome::text(rejection.user_message())).await;
            }
        };
        log::debug!("Bot {} user {}: /{}", bot.id, event.user_id, command.name());

        match command {
            Command::Start => {
                self.economy.open_account(&bot.id, event.user_id).await?;
                self.economy.count_command(&bot.id, "start", "ok").await;
                let welcome = texts::welcome(bot);
                let message = match &bot.bot_image_url {
                    Some(url) => Outbound::Photo {
                        url: url.clone(),
                        caption: welcome,
                        buttons: Vec::new(),
                    },
                    None => Outbound::text(welcome),
                };
                self.gateway.send(&bot.token, event.chat_id, message).await
            }
            Command::Help => self.reply_counted(bot, &event, "help", texts::help()).await,
            Command::Minigames => self.reply_counted(bot, &event, "minigames", texts::minigames()).await,
            Command::Unknown(_) => self.reply_counted(bot, &event, "unknown", texts::unknown_command()).await,
            Command::Leaderboard => {
                let top = self.economy.leaderboard(&bot.id).await?;
                self.reply_counted(bot, &event, "leaderboard", texts::leaderboard(&top)).await
            }
            Command::Rank => {
                let (record, ranking) = self.economy.rank(&bot.id, event.user_id).await?;
                let outcome = texts::rank(&event.display_name, &record, &ranking);
                self.reply_counted(bot, &event, "rank", outcome).await
            }
            Command::Economy(command) => {
                let outcome = match self.economy.execute(&bot.id, event.user_id, &command).await? {
                    Ok(outcome) => outcome,
                    Err(rejection) => Outcome::text(rejection.user_message()),
                };
                if let Some(level) = outcome.level_up {
                    self.announce_level_up(bot, event.chat_id, &event.display_name, level);
                }
                self.reply(bot, event.chat_id, outcome).await
            }
        }
    }

    /// Plain group message: XP for users who already have an account.
    async fn on_chatter(&self, bot: &Bot, event: &ChatEvent) -> AppResult<()> {
        if let Some(outcome) = self.economy.chat_activity(&bot.id, event.user_id).await? {
            if let Some(level) = outcome.level_up {
                self.announce_level_up(bot, event.chat_id, &event.display_name, level);
            }
        }
        Ok(())
    }

    async fn on_callback(&self, bot: &Bot, event: CallbackEvent) -> AppResult<()> {
        let token = bot.token.as_str();
        match event.data.as_str() {
            callbacks::VERIFY_MEMBERSHIP => {
                if self.passes_gate(bot, event.user_id).await {
                    self.gateway
                        .answer_callback(token, &event.id, texts::MEMBERSHIP_VERIFIED_ALERT, true)
                        .await?;
                    let chat_id = event.chat_id.unwrap_or(event.user_id);
                    self.gateway
                        .send(token, chat_id, Outbound::text(texts::MEMBERSHIP_VERIFIED))
                        .await
                } else {
                    metrics::MEMBERSHIP_DENIED_TOTAL.inc();
                    self.gateway
                        .answer_callback(token, &event.id, texts::MEMBERSHIP_MISSING_ALERT, true)
                        .await
                }
            }
            callbacks::DEPOSIT_PROMPT => {
                self.gateway
                    .answer_callback(token, &event.id, texts::DEPOSIT_HINT, false)
                    .await
            }
            callbacks::WITHDRAW_PROMPT => {
                self.gateway
                    .answer_callback(token, &event.id, texts::WITHDRAW_HINT, false)
                    .await
            }
            other => {
                log::debug!("Unhandled callback '{}' on bot {}", other, bot.id);
                self.gateway.answer_callback(token, &event.id, "", false).await
            }
        }
    }

    /// Whether an `@mention`ed command names this bot. The username comes
    /// from the stats row, falling back to getMe; an unresolvable username
    /// counts as someone else.
    async fn addressed_to(&self, bot: &Bot, invocation: &Invocation) -> bool {
        match self.username_of(bot).await {
            Ok(username) => invocation.is_for(&username),
            Err(e) => {
                log::warn!("Cannot resolve username of bot {}: {}", bot.id, e);
                false
            }
        }
    }

    async fn username_of(&self, bot: &Bot) -> AppResult<String> {
        let bot_id = bot.id.clone();
        let stored = run_blocking(&self.pool, move |conn| {
            Ok(bots::ensure_stats(conn, &bot_id, Utc::now())?.bot_username)
        })
        .await?;
        if let Some(username) = stored {
            return Ok(username);
        }

        let username = self.gateway.bot_username(&bot.token).await?;
        let bot_id = bot.id.clone();
        let known = username.clone();
        run_blocking(&self.pool, move |conn| {
            Ok(bots::set_bot_username(conn, &bot_id, &known, Utc::now())?)
        })
        .await?;
        Ok(username)
    }

    /// Channel membership check. Bots without a channel let everyone in;
    /// a failed lookup denies.
    async fn passes_gate(&self, bot: &Bot, user_id: i64) -> bool {
        let Some(channel) = bot.channel_chat() else {
            return true;
        };
        match self.gateway.is_member(&bot.token, &channel, user_id).await {
            Ok(member) => member,
            Err(e) => {
                log::warn!(
                    "Membership check of user {} in {} failed, denying: {}",
                    user_id,
                    channel,
                    e
                );
                false
            }
        }
    }

    async fn reply(&self, bot: &Bot, chat_id: i64, outcome: Outcome) -> AppResult<()> {
        if outcome.text.is_empty() {
            return Ok(());
        }
        let message = Outbound::Text {
            text: outcome.text,
            buttons: outcome.buttons,
        };
        self.gateway.send(&bot.token, chat_id, message).await
    }

    async fn reply_counted(&self, bot: &Bot, event: &ChatEvent, name: &str, outcome: Outcome) -> AppResult<()> {
        self.economy.count_command(&bot.id, name, "ok").await;
        self.reply(bot, event.chat_id, outcome).await
    }

    /// Sends the level-up animation in the background.
    fn announce_level_up(&self, bot: &Bot, chat_id: i64, display_name: &str, level: u32) {
        let gateway = Arc::clone(&self.gateway);
        let token = bot.token.clone();
        let message = Outbound::Animation {
            url: config::LEVEL_UP_ANIMATION_URL.clone(),
            caption: texts::level_up_caption(display_name, level),
        };
        tokio::spawn(async move {
            if let Err(e) = gateway.send(&token, chat_id, message).await {
                log::warn!("Level-up notice to chat {} failed: {}", chat_id, e);
            }
        });
    }
}

/// Resolves the bot for a webhook call; unknown and inactive bots are
/// `NotFound`.
pub async fn require_active_bot(handler: &WebhookHandler, bot_id: &str) -> AppResult<Bot> {
    handler
        .active_bot(bot_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bot not found or inactive".to_string()))
}
