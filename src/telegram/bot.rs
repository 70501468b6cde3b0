//! Bot instance creation and the command menu shown in Telegram clients

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::core::config;
use crate::core::error::AppResult;

/// Creates a Bot for `token` with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Bot instance sharing nothing with other tokens
/// * `Err(AppError)` - Invalid BOT_API_URL or HTTP client setup failure
pub fn build_bot(token: &str) -> AppResult<Bot> {
    let client = ClientBuilder::new()
        .timeout(config::network::timeout())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
    let bot = Bot::with_client(token, client);

    // Check if local Bot API server is configured
    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::debug!("Using custom Bot API URL: {}", bot_api_url);
            bot.set_api_url(url::Url::parse(bot_api_url)?)
        }
        None => bot,
    };
    Ok(bot)
}

/// Commands listed in the Telegram "/" menu
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Welcome and quick commands"),
        BotCommand::new("balance", "Check your money"),
        BotCommand::new("daily", "Claim the daily reward"),
        BotCommand::new("work", "Work for money"),
        BotCommand::new("deposit", "Move cash to the bank"),
        BotCommand::new("withdraw", "Take cash from the bank"),
        BotCommand::new("shop", "Browse items"),
        BotCommand::new("inventory", "Your items"),
        BotCommand::new("jobs", "View jobs"),
        BotCommand::new("crime", "Commit a crime"),
        BotCommand::new("rob", "Rob someone"),
        BotCommand::new("gamble", "Bet money"),
        BotCommand::new("slots", "Slot machine"),
        BotCommand::new("transfer", "Send money to a user"),
        BotCommand::new("leaderboard", "Top users"),
        BotCommand::new("rank", "Your rank"),
        BotCommand::new("help", "All commands"),
    ]
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(bot_commands()).await?;
    Ok(())
}
