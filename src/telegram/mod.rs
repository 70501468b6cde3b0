//! Telegram integration: Bot API gateway, update decoding and the webhook

pub mod bot;
pub mod gateway;
pub mod texts;
pub mod update;
pub mod webhook;

// Re-exports for convenience
pub use gateway::{ChatGateway, Outbound, TeloxideGateway};
pub use update::{event_of, CallbackEvent, ChatEvent, Event};
pub use webhook::WebhookHandler;
