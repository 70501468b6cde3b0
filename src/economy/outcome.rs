//! User-visible results of commands and the errors that replace them.

use chrono::Duration;
use rust_decimal::Decimal;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Inline button attached under an outcome message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Url { label: String, url: String },
    Callback { label: String, data: String },
}

impl Button {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Button::Callback {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Callback payloads of inline buttons.
pub mod callbacks {
    pub const DEPOSIT_PROMPT: &str = "deposit_prompt";
    pub const WITHDRAW_PROMPT: &str = "withdraw_prompt";
    pub const VERIFY_MEMBERSHIP: &str = "verify_membership";
}

/// Text (HTML markup) plus optional button rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
    /// New level when the command pushed the user over a level boundary.
    pub level_up: Option<u32>,
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_level_up(mut self, level_up: Option<u32>) -> Self {
        self.level_up = level_up;
        self
    }
}

/// Cooldown-gated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CooldownKind {
    Daily,
    Work,
    Crime,
    Rob,
}

/// Minigames that leave a session trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum GameType {
    Slots,
    Gamble,
}

/// Side effects a transition asks the caller to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Credit another account of the same bot (transfer receiver).
    Credit { user_id: i64, amount: Decimal },
    /// A minigame round was played; `net` is the signed wallet change.
    GamePlayed { game: GameType, wager: Decimal, net: Decimal, score: u32 },
}

/// Why a command was rejected. A rejected command never mutates the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Malformed or missing argument.
    #[error("{0}")]
    Validation(String),
    /// Funds, items or level do not allow the action.
    #[error("{0}")]
    Precondition(String),
    #[error("{kind} is on cooldown")]
    Cooldown { kind: CooldownKind, remaining: Duration },
    /// Unknown catalog key or account.
    #[error("{0}")]
    NotFound(String),
}

impl CommandError {
    /// Message sent back to the chat.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Validation(message)
            | CommandError::Precondition(message)
            | CommandError::NotFound(message) => message.clone(),
            CommandError::Cooldown { kind, remaining } => {
                let wait = super::format::format_wait(*remaining);
                match kind {
                    CooldownKind::Daily => format!("⏰ <b>Daily Reward</b>\n\nAvailable in {}", wait),
                    CooldownKind::Work => format!("⏳ You're tired! Come back in {}.", wait),
                    CooldownKind::Crime => format!("⏳ Lay low for {} more!", wait),
                    CooldownKind::Rob => format!("⏳ Police are looking for you! Wait {}.", wait),
                }
            }
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Validation(_) => "validation",
            CommandError::Precondition(_) => "precondition",
            CommandError::Cooldown { .. } => "cooldown",
            CommandError::NotFound(_) => "not_found",
        }
    }
}
