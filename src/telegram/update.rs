//! Inbound webhook updates, reduced to the events the bot reacts to.

use teloxide::types::{CallbackQuery, Message, Update, UpdateKind, User};

/// A text message from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub text: String,
    pub is_private: bool,
}

/// A press on an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub id: String,
    pub user_id: i64,
    /// Chat of the message carrying the button, when Telegram still has it
    pub chat_id: Option<i64>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Chat(ChatEvent),
    Callback(CallbackEvent),
}

fn user_id(user: &User) -> i64 {
    user.id.0 as i64
}

fn display_name(user: &User) -> String {
    let name = user.first_name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    match &user.username {
        Some(username) => format!("@{}", username),
        None => format!("User {}", user.id),
    }
}

fn chat_event(message: &Message) -> Option<ChatEvent> {
    let from = message.from.as_ref()?;
    let text = message.text()?;
    Some(ChatEvent {
        chat_id: message.chat.id.0,
        user_id: user_id(from),
        display_name: display_name(from),
        text: text.to_string(),
        is_private: message.chat.is_private(),
    })
}

fn callback_event(query: &CallbackQuery) -> CallbackEvent {
    CallbackEvent {
        id: query.id.0.clone(),
        user_id: user_id(&query.from),
        chat_id: query.message.as_ref().map(|message| message.chat().id.0),
        data: query.data.clone().unwrap_or_default(),
    }
}

/// The event carried by the update; `None` for updates the bot ignores
/// (edits, media without text, service messages).
pub fn event_of(update: &Update) -> Option<Event> {
    match &update.kind {
        UpdateKind::Message(message) => chat_event(message).map(Event::Chat),
        UpdateKind::CallbackQuery(query) => Some(Event::Callback(callback_event(query))),
        _ => None,
    }
}
