//! Outbound Bot API calls.
//!
//! The webhook and dashboard talk to Telegram only through [`ChatGateway`];
//! every call names the bot token it acts for, since one process serves
//! many bots.

use async_trait::async_trait;
use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode, Recipient,
};
use url::Url;

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::economy::Button;
use crate::telegram::bot::{build_bot, setup_bot_commands};

/// Message sent to a chat. Texts and captions are HTML.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text {
        text: String,
        buttons: Vec<Vec<Button>>,
    },
    Photo {
        url: String,
        caption: String,
        buttons: Vec<Vec<Button>>,
    },
    Animation {
        url: String,
        caption: String,
    },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Text or caption of the message.
    pub fn body(&self) -> &str {
        match self {
            Outbound::Text { text, .. } => text,
            Outbound::Photo { caption, .. } | Outbound::Animation { caption, .. } => caption,
        }
    }

    pub fn buttons(&self) -> &[Vec<Button>] {
        match self {
            Outbound::Text { buttons, .. } | Outbound::Photo { buttons, .. } => buttons,
            Outbound::Animation { .. } => &[],
        }
    }
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send(&self, token: &str, chat_id: i64, message: Outbound) -> AppResult<()>;

    /// Whether the user is present in `channel` (`@name`).
    async fn is_member(&self, token: &str, channel: &str, user_id: i64) -> AppResult<bool>;

    async fn answer_callback(&self, token: &str, callback_id: &str, text: &str, alert: bool) -> AppResult<()>;

    /// Username of the bot behind `token`, without `@`.
    async fn bot_username(&self, token: &str) -> AppResult<String>;

    async fn set_webhook(&self, token: &str, url: &str) -> AppResult<()>;

    /// Drops any client state kept for a token that is no longer in use.
    fn forget(&self, token: &str);
}

/// Gateway backed by teloxide, one cached `Bot` per token.
#[derive(Default)]
pub struct TeloxideGateway {
    bots: DashMap<String, Bot>,
}

impl TeloxideGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn bot(&self, token: &str) -> AppResult<Bot> {
        if let Some(bot) = self.bots.get(token) {
            return Ok(bot.clone());
        }
        let bot = build_bot(token)?;
        self.bots.insert(token.to_string(), bot.clone());
        Ok(bot)
    }
}

fn upstream(method: &'static str) -> impl Fn(teloxide::RequestError) -> AppError {
    move |e| {
        metrics::record_upstream_error(method);
        log::warn!("Bot API {} failed: {}", method, e);
        AppError::Telegram(e)
    }
}

/// Inline keyboard for button rows; buttons with unusable URLs are dropped.
fn keyboard(rows: &[Vec<Button>]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|button| match button {
                    Button::Url { label, url } => match Url::parse(url) {
                        Ok(url) => Some(InlineKeyboardButton::url(label.clone(), url)),
                        Err(e) => {
                            log::warn!("Dropping button '{}' with bad url {}: {}", label, url, e);
                            None
                        }
                    },
                    Button::Callback { label, data } => Some(InlineKeyboardButton::callback(label.clone(), data.clone())),
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

fn telegram_user(user_id: i64) -> AppResult<UserId> {
    u64::try_from(user_id)
        .map(UserId)
        .map_err(|_| AppError::Validation(format!("{} is not a user id", user_id)))
}

#[async_trait]
impl ChatGateway for TeloxideGateway {
    async fn send(&self, token: &str, chat_id: i64, message: Outbound) -> AppResult<()> {
        let bot = self.bot(token)?;
        let chat = ChatId(chat_id);
        match message {
            Outbound::Text { text, buttons } => {
                let mut request = bot.send_message(chat, text).parse_mode(ParseMode::Html);
                if let Some(markup) = keyboard(&buttons) {
                    request = request.reply_markup(markup);
                }
                request.await.map_err(upstream("sendMessage"))?;
            }
            Outbound::Photo { url, caption, buttons } => {
                let mut request = bot
                    .send_photo(chat, InputFile::url(Url::parse(&url)?))
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(markup) = keyboard(&buttons) {
                    request = request.reply_markup(markup);
                }
                request.await.map_err(upstream("sendPhoto"))?;
            }
            Outbound::Animation { url, caption } => {
                bot.send_animation(chat, InputFile::url(Url::parse(&url)?))
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
                    .map_err(upstream("sendAnimation"))?;
            }
        }
        Ok(())
    }

    async fn is_member(&self, token: &str, channel: &str, user_id: i64) -> AppResult<bool> {
        let bot = self.bot(token)?;
        let member = bot
            .get_chat_member(Recipient::ChannelUsername(channel.to_string()), telegram_user(user_id)?)
            .await
            .map_err(upstream("getChatMember"))?;
        Ok(member.is_present())
    }

    async fn answer_callback(&self, token: &str, callback_id: &str, text: &str, alert: bool) -> AppResult<()> {
        let bot = self.bot(token)?;
        bot.answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .text(text)
            .show_alert(alert)
            .await
            .map_err(upstream("answerCallbackQuery"))?;
        Ok(())
    }

    async fn bot_username(&self, token: &str) -> AppResult<String> {
        let bot = self.bot(token)?;
        let me = bot.get_me().await.map_err(upstream("getMe"))?;
        Ok(me.username().to_string())
    }

    async fn set_webhook(&self, token: &str, url: &str) -> AppResult<()> {
        let bot = self.bot(token)?;
        bot.set_webhook(Url::parse(url)?).await.map_err(upstream("setWebhook"))?;
        if let Err(e) = setup_bot_commands(&bot).await {
            log::warn!("Webhook set but command menu update failed: {}", e);
        }
        Ok(())
    }

    fn forget(&self, token: &str) {
        if self.bots.remove(token).is_some() {
            log::debug!("Dropped cached client of a retired bot token");
        }
    }
}
