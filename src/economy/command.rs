//! Parsing of slash commands into typed commands.

use rust_decimal::Decimal;

use super::catalog::{Job, ShopItem};
use super::format::escape_html;
use super::outcome::CommandError;

/// Amount argument of money commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    All,
    Exact(Decimal),
}

/// Commands that read or transform an economy record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EconomyCommand {
    Balance,
    Daily,
    Work,
    Deposit(Amount),
    Withdraw(Amount),
    Shop,
    Buy(ShopItem),
    Inventory,
    Jobs,
    Apply(Job),
    Crime,
    Rob { target: Option<String> },
    Gamble(Decimal),
    Slots(Decimal),
    Transfer { receiver: i64, amount: Decimal },
}

impl EconomyCommand {
    /// Account, other than the caller's, that the command touches.
    pub fn counterparty(&self) -> Option<i64> {
        match self {
            EconomyCommand::Transfer { receiver, .. } => Some(*receiver),
            _ => None,
        }
    }

    /// Stable name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            EconomyCommand::Balance => "balance",
            EconomyCommand::Daily => "daily",
            EconomyCommand::Work => "work",
            EconomyCommand::Deposit(_) => "deposit",
            EconomyCommand::Withdraw(_) => "withdraw",
            EconomyCommand::Shop => "shop",
            EconomyCommand::Buy(_) => "buy",
            EconomyCommand::Inventory => "inventory",
            EconomyCommand::Jobs => "jobs",
            EconomyCommand::Apply(_) => "apply",
            EconomyCommand::Crime => "crime",
            EconomyCommand::Rob { .. } => "rob",
            EconomyCommand::Gamble(_) => "gamble",
            EconomyCommand::Slots(_) => "slots",
            EconomyCommand::Transfer { .. } => "transfer",
        }
    }
}

/// Every command a bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Minigames,
    Leaderboard,
    Rank,
    Economy(EconomyCommand),
    Unknown(String),
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Minigames => "minigames",
            Command::Leaderboard => "leaderboard",
            Command::Rank => "rank",
            Command::Economy(command) => command.name(),
            Command::Unknown(_) => "unknown",
        }
    }

    /// Parses `/name[@bot] args…`. Returns `None` for text that is not a
    /// command; argument problems come back as `Err`.
    pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
        Invocation::parse(text).map(|invocation| invocation.command)
    }

    fn from_parts(name: &str, args: &[&str]) -> Result<Command, CommandError> {
        let first = args.first().copied();
        let economy = match name {
            "start" => return Ok(Command::Start),
            "help" => return Ok(Command::Help),
            "minigames" | "games" => return Ok(Command::Minigames),
            "leaderboard" | "lb" | "top" => return Ok(Command::Leaderboard),
            "rank" => return Ok(Command::Rank),
            "balance" | "bal" => EconomyCommand::Balance,
            "daily" => EconomyCommand::Daily,
            "work" => EconomyCommand::Work,
            "deposit" | "dep" => EconomyCommand::Deposit(parse_amount(first, "/deposit <amount|all>", true)?),
            "withdraw" | "with" => EconomyCommand::Withdraw(parse_amount(first, "/withdraw <amount|all>", true)?),
            "shop" => EconomyCommand::Shop,
            "buy" => {
                let arg = first.ok_or_else(|| usage("/buy <item>"))?;
                let item = ShopItem::lookup(arg)
                    .ok_or_else(|| CommandError::NotFound("❌ Invalid item! Use /shop to see available items.".into()))?;
                EconomyCommand::Buy(item)
            }
            "inventory" | "inv" => EconomyCommand::Inventory,
            "jobs" => EconomyCommand::Jobs,
            "apply" => {
                let arg = first.ok_or_else(|| usage("/apply <job>"))?;
                let job = arg
                    .parse::<Job>()
                    .map_err(|_| CommandError::NotFound("❌ Unknown job! Use /jobs to see available jobs.".into()))?;
                EconomyCommand::Apply(job)
            }
            "crime" => EconomyCommand::Crime,
            "rob" => EconomyCommand::Rob {
                target: first.map(|target| target.trim_start_matches('@').to_string()),
            },
            "gamble" | "bet" => EconomyCommand::Gamble(exact(parse_amount(first, "/gamble <amount>", false)?)),
            "slots" => EconomyCommand::Slots(exact(parse_amount(first, "/slots <amount>", false)?)),
            "transfer" | "give" | "pay" => {
                let receiver = first
                    .ok_or_else(|| usage("/transfer <user_id> <amount>"))?
                    .trim_start_matches('@')
                    .parse::<i64>()
                    .map_err(|_| CommandError::Validation("❌ Use the numeric user ID of the receiver.".into()))?;
                let amount = exact(parse_amount(args.get(1).copied(), "/transfer <user_id> <amount>", false)?);
                EconomyCommand::Transfer { receiver, amount }
            }
            other => return Ok(Command::Unknown(other.to_string())),
        };
        Ok(Command::Economy(economy))
    }
}

/// A command together with the bot it was addressed to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Lower-cased `@botname` suffix, without the `@`
    pub mention: Option<String>,
    pub command: Result<Command, CommandError>,
}

impl Invocation {
    pub fn parse(text: &str) -> Option<Invocation> {
        let body = text.trim().strip_prefix('/')?;
        let lowered = body.to_lowercase();
        let mut words = lowered.split_whitespace();
        let head = words.next()?;
        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention.to_string())),
            None => (head, None),
        };
        let args: Vec<&str> = words.collect();
        Some(Invocation {
            mention,
            command: Command::from_parts(name, &args),
        })
    }

    /// Whether the command is meant for the bot called `username`.
    /// Unaddressed commands are meant for every bot in the chat.
    pub fn is_for(&self, username: &str) -> bool {
        match &self.mention {
            Some(mention) => mention.eq_ignore_ascii_case(username.trim_start_matches('@')),
            None => true,
        }
    }
}

fn usage(pattern: &str) -> CommandError {
    CommandError::Validation(format!("❌ Usage: {}", escape_html(pattern)))
}

fn exact(amount: Amount) -> Decimal {
    match amount {
        Amount::Exact(value) => value,
        Amount::All => Decimal::ZERO,
    }
}

/// Positive whole amount, or `all` when allowed.
fn parse_amount(arg: Option<&str>, pattern: &str, allow_all: bool) -> Result<Amount, CommandError> {
    let arg = arg.ok_or_else(|| usage(pattern))?;
    if allow_all && arg == "all" {
        return Ok(Amount::All);
    }
    let cleaned: String = arg.trim_start_matches('$').chars().filter(|ch| *ch != ',' && *ch != '_').collect();
    match cleaned.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Amount::Exact(Decimal::from(value))),
        _ => Err(CommandError::Validation("❌ Invalid amount!".into())),
    }
}
