//! Chat texts that are not produced by the command processor.

use crate::economy::catalog::title_of;
use crate::economy::format::{escape_html, format_money};
use crate::economy::outcome::callbacks;
use crate::economy::{Button, EconomyRecord, Outcome};
use crate::storage::bots::Bot;
use crate::storage::Ranking;

const DEFAULT_WELCOME: &str = "🎉 <b>Welcome to the Bot!</b>";

/// `/start`: the bot's own welcome plus quick commands.
pub fn welcome(bot: &Bot) -> String {
    let greeting = match bot.welcome_message.as_deref() {
        Some(message) => escape_html(message),
        None => DEFAULT_WELCOME.to_string(),
    };
    format!(
        "{}\n\n💰 Starting balance: $1,000\n\n📋 <b>Quick Commands:</b>\n\
         /balance - Check your money\n/daily - Daily reward\n/work - Work for money\n/help - All commands",
        greeting
    )
}

pub fn help() -> Outcome {
    Outcome::text(
        "📋 <b>Bot Commands</b>\n\n\
         💰 <b>Economy</b>\n\
         /balance - Check balance\n\
         /daily - Daily reward (24h)\n\
         /work - Work at your job\n\
         /deposit - Bank deposit\n\
         /withdraw - Bank withdrawal\n\
         /transfer - Send money to a user\n\n\
         🛒 <b>Shopping</b>\n\
         /shop - Browse items\n\
         /buy - Purchase item\n\
         /inventory - Your items\n\n\
         💼 <b>Jobs &amp; Crime</b>\n\
         /jobs - View jobs\n\
         /apply - Apply for job\n\
         /crime - Commit crime\n\
         /rob - Rob users\n\n\
         🎮 <b>Games</b>\n\
         /gamble - Bet money\n\
         /slots - Slot machine\n\
         /minigames - Play games\n\n\
         📊 <b>Stats</b>\n\
         /rank - Your rank\n\
         /leaderboard - Top users",
    )
}

pub fn minigames() -> Outcome {
    Outcome::text(
        "🎮 <b>Mini Games</b>\n\n\
         🎲 /gamble &lt;amount&gt; - 45% chance to double your bet\n\
         🎰 /slots &lt;amount&gt; - three of a kind pays ×10, a pair pays ×2\n\n\
         Bets come from your wallet. Good luck!",
    )
}

pub fn unknown_command() -> Outcome {
    Outcome::text("❌ Unknown command! Use /help to see all commands")
}

/// Shown instead of a command while the user is not in the bot's channel.
pub fn join_prompt(bot: &Bot) -> Outcome {
    let channel = bot.channel_chat().unwrap_or_default();
    let mut buttons = Vec::new();
    if let Some(link) = bot.channel_link() {
        buttons.push(vec![Button::url("Join Channel ✨", link)]);
    }
    buttons.push(vec![Button::callback("✅ I Joined", callbacks::VERIFY_MEMBERSHIP)]);
    Outcome::text(format!(
        "⚠️ <b>Join Required!</b>\n\nPlease join {} to use this bot.",
        escape_html(&channel)
    ))
    .with_buttons(buttons)
}

pub const MEMBERSHIP_VERIFIED_ALERT: &str = "✅ Verified! You can now use the bot.";
pub const MEMBERSHIP_VERIFIED: &str = "✅ Membership verified! Use /start to see available commands.";
pub const MEMBERSHIP_MISSING_ALERT: &str = "❌ You haven't joined the channel yet!";
pub const DEPOSIT_HINT: &str = "Use /deposit <amount> or /deposit all";
pub const WITHDRAW_HINT: &str = "Use /withdraw <amount> or /withdraw all";

pub fn leaderboard(records: &[EconomyRecord]) -> Outcome {
    if records.is_empty() {
        return Outcome::text("🏆 <b>Leaderboard</b>\n\nNobody has played yet. Use /daily to get started!");
    }
    let medals = ["🥇", "🥈", "🥉"];
    let lines: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let place = medals
                .get(index)
                .map(|medal| medal.to_string())
                .unwrap_or_else(|| format!("{}.", index + 1));
            format!(
                "{} <code>{}</code> - {} (Lv {})",
                place,
                record.user_id,
                format_money(record.net_worth()),
                record.level
            )
        })
        .collect();
    Outcome::text(format!("🏆 <b>Leaderboard</b>\n\n{}", lines.join("\n")))
}

pub fn rank(display_name: &str, record: &EconomyRecord, ranking: &Ranking) -> Outcome {
    Outcome::text(format!(
        "📊 <b>{}'s Rank</b>\n\n🏅 Rank: #{} of {}\n💎 Net Worth: {}\n⭐ Level {} ({} XP)\n💼 Job: {}",
        escape_html(display_name),
        ranking.rank,
        ranking.total,
        format_money(ranking.net_worth),
        record.level,
        record.xp,
        title_of(record.job)
    ))
}

pub fn level_up_caption(display_name: &str, level: u32) -> String {
    format!(
        "🎉 <b>LEVEL UP!</b>\n\n{} reached Level {}!\n✨ Keep chatting to level up!",
        escape_html(display_name),
        level
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn bot(channel: Option<&str>, welcome: Option<&str>) -> Bot {
        Bot {
            id: "bot-1".into(),
            owner_id: "owner".into(),
            name: "Casino".into(),
            token: "t".into(),
            channel_username: channel.map(str::to_string),
            bot_image_url: None,
            welcome_message: welcome.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_join_prompt_buttons() {
        let outcome = join_prompt(&bot(Some("casino_news"), None));
        assert!(outcome.text.contains("@casino_news"));
        assert_eq!(
            outcome.buttons,
            vec![
                vec![Button::url("Join Channel ✨", "https://t.me/casino_news")],
                vec![Button::callback("✅ I Joined", "verify_membership")],
            ]
        );
    }

    #[test]
    fn test_welcome_escapes_owner_text() {
        let text = welcome(&bot(None, Some("Hi <friends> & co")));
        assert!(text.starts_with("Hi &lt;friends&gt; &amp; co"));
        assert!(welcome(&bot(None, None)).starts_with(DEFAULT_WELCOME));
    }

    #[test]
    fn test_leaderboard_lines() {
        let mut first = EconomyRecord::new("bot-1", 7);
        first.bank = Decimal::from(4_000);
        let second = EconomyRecord::new("bot-1", 8);
        let outcome = leaderboard(&[first, second]);
        assert!(outcome.text.contains("🥇 <code>7</code> - $5,000 (Lv 1)"));
        assert!(outcome.text.contains("🥈 <code>8</code> - $1,000"));
        assert!(leaderboard(&[]).text.contains("Nobody"));
    }

    #[test]
    fn test_level_up_caption() {
        assert_eq!(
            level_up_caption("Ana", 3),
            "🎉 <b>LEVEL UP!</b>\n\nAna reached Level 3!\n✨ Keep chatting to level up!"
        );
    }
}
