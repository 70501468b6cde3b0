//! Pure state transitions for economy commands.
//!
//! Nothing here performs I/O: the caller loads the record, runs
//! [`process`] and persists the returned record. A rejected command returns
//! a [`CommandError`] and leaves the caller's record untouched.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use strum::IntoEnumIterator;

use super::catalog::{salary_of, title_of, Crime, Job, ShopItem, SLOT_SYMBOLS};
use super::command::{Amount, EconomyCommand};
use super::dice::Dice;
use super::format::{escape_html, format_money, progress_bar};
use super::outcome::{callbacks, Button, CommandError, CooldownKind, Effect, GameType, Outcome};
use super::record::EconomyRecord;
use crate::core::config::economy as rules;

/// Accepted command: the next record, what to tell the user and what else
/// the caller has to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub record: EconomyRecord,
    pub outcome: Outcome,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(record: EconomyRecord, outcome: Outcome) -> Self {
        Self {
            record,
            outcome,
            effects: Vec::new(),
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Resolves one economy command against `record`.
pub fn process(
    record: &EconomyRecord,
    command: &EconomyCommand,
    now: DateTime<Utc>,
    dice: &mut dyn Dice,
) -> Result<Transition, CommandError> {
    match command {
        EconomyCommand::Balance => Ok(Transition::new(record.clone(), balance_report(record))),
        EconomyCommand::Daily => daily(record, now),
        EconomyCommand::Work => work(record, now, dice),
        EconomyCommand::Deposit(amount) => deposit(record, *amount),
        EconomyCommand::Withdraw(amount) => withdraw(record, *amount),
        EconomyCommand::Shop => Ok(Transition::new(record.clone(), shop_listing())),
        EconomyCommand::Buy(item) => buy(record, *item),
        EconomyCommand::Inventory => Ok(Transition::new(record.clone(), inventory_listing(record))),
        EconomyCommand::Jobs => Ok(Transition::new(record.clone(), job_listing(record))),
        EconomyCommand::Apply(job) => apply(record, *job),
        EconomyCommand::Crime => crime(record, now, dice),
        EconomyCommand::Rob { target } => rob(record, target.as_deref(), now, dice),
        EconomyCommand::Gamble(amount) => gamble(record, *amount, dice),
        EconomyCommand::Slots(amount) => slots(record, *amount, dice),
        EconomyCommand::Transfer { receiver, amount } => transfer(record, *receiver, *amount),
    }
}

/// XP for a non-command message in a group chat.
pub fn award_chat_xp(record: &EconomyRecord, dice: &mut dyn Dice) -> Transition {
    let mut next = record.clone();
    let gained = dice.between(rules::CHAT_XP_MIN, rules::CHAT_XP_MAX + 1);
    next.total_messages = next.total_messages.saturating_add(1);

    let outcome = match next.gain_xp(gained) {
        Some(level) => Outcome::text(format!("🎉 <b>Level Up!</b>\n\nYou reached level {}!", level))
            .with_level_up(Some(level)),
        None => Outcome::default(),
    };
    Transition::new(next, outcome)
}

fn ensure_ready(
    last: Option<DateTime<Utc>>,
    window: Duration,
    now: DateTime<Utc>,
    kind: CooldownKind,
) -> Result<(), CommandError> {
    if let Some(last) = last {
        let elapsed = now.signed_duration_since(last);
        if elapsed < window {
            return Err(CommandError::Cooldown {
                kind,
                remaining: window - elapsed,
            });
        }
    }
    Ok(())
}

/// `percent`% of `amount`, rounded down to a whole unit.
fn percent_of(amount: Decimal, percent: u64) -> Decimal {
    (amount * Decimal::from(percent) / Decimal::ONE_HUNDRED).floor()
}

/// Checks a stake against the wallet.
fn stake(record: &EconomyRecord, amount: Decimal) -> Result<Decimal, CommandError> {
    if amount <= Decimal::ZERO {
        return Err(CommandError::Validation("❌ Invalid amount!".into()));
    }
    if amount > record.balance {
        return Err(CommandError::Precondition(format!(
            "❌ Insufficient balance! You only have {}.",
            format_money(record.balance)
        )));
    }
    Ok(amount)
}

fn wallet_line(record: &EconomyRecord) -> String {
    format!("👛 Wallet: {}", format_money(record.balance))
}

fn balance_report(record: &EconomyRecord) -> Outcome {
    let into_level = record.xp % rules::XP_PER_LEVEL;
    let text = format!(
        "💰 <b>Balance</b>\n\n{}\n🏦 Bank: {}\n💎 Net Worth: {}\n\n⭐ Level {}\n{} {}/{} XP\n💼 Job: {}",
        wallet_line(record),
        format_money(record.bank),
        format_money(record.net_worth()),
        record.level,
        progress_bar(into_level, rules::XP_PER_LEVEL, 10),
        into_level,
        rules::XP_PER_LEVEL,
        title_of(record.job),
    );
    Outcome::text(text).with_buttons(vec![vec![
        Button::callback("🏦 Deposit", callbacks::DEPOSIT_PROMPT),
        Button::callback("💸 Withdraw", callbacks::WITHDRAW_PROMPT),
    ]])
}

fn daily(record: &EconomyRecord, now: DateTime<Utc>) -> Result<Transition, CommandError> {
    ensure_ready(record.last_daily, rules::daily_cooldown(), now, CooldownKind::Daily)?;

    let reward = Decimal::from(rules::DAILY_BASE + u64::from(record.level) * rules::DAILY_PER_LEVEL);
    let mut next = record.clone();
    next.balance += reward;
    next.last_daily = Some(now);

    let text = format!(
        "🎁 <b>Daily Reward</b>\n\n+{} (level {} bonus included)\n\n{}\n\nCome back tomorrow for more!",
        format_money(reward),
        record.level,
        wallet_line(&next)
    );
    Ok(Transition::new(next, Outcome::text(text)))
}

fn work(record: &EconomyRecord, now: DateTime<Utc>, dice: &mut dyn Dice) -> Result<Transition, CommandError> {
    ensure_ready(record.last_work, rules::work_cooldown(), now, CooldownKind::Work)?;

    let base = Decimal::from(dice.between(rules::WORK_MIN, rules::WORK_MAX));
    let salary = salary_of(record.job);
    let bonus = Decimal::from(u64::from(record.level) * rules::WORK_PER_LEVEL);
    let earned = base + salary + bonus;

    let mut next = record.clone();
    next.balance += earned;
    next.last_work = Some(now);
    let level_up = next.gain_xp(rules::WORK_XP);

    let text = format!(
        "💼 <b>Work Complete</b>\n\nYou worked as {} and earned {}!\n\n💵 Base pay: {}\n💼 Salary: {}\n⭐ Level bonus: {}\n✨ +{} XP\n\n{}",
        title_of(record.job),
        format_money(earned),
        format_money(base),
        format_money(salary),
        format_money(bonus),
        rules::WORK_XP,
        wallet_line(&next)
    );
    Ok(Transition::new(next, Outcome::text(text).with_level_up(level_up)))
}

/// Resolves `all` against what is available and checks the bounds.
fn resolve_amount(amount: Amount, available: Decimal, empty: &str, short: &str) -> Result<Decimal, CommandError> {
    let amount = match amount {
        Amount::All if available <= Decimal::ZERO => return Err(CommandError::Precondition(empty.to_string())),
        Amount::All => available,
        Amount::Exact(value) => value,
    };
    if amount <= Decimal::ZERO {
        return Err(CommandError::Validation("❌ Invalid amount!".into()));
    }
    if amount > available {
        return Err(CommandError::Precondition(short.to_string()));
    }
    Ok(amount)
}

fn deposit(record: &EconomyRecord, amount: Amount) -> Result<Transition, CommandError> {
    let amount = resolve_amount(
        amount,
        record.balance,
        "❌ You have no cash to deposit!",
        "❌ Insufficient balance!",
    )?;

    let mut next = record.clone();
    next.balance -= amount;
    next.bank += amount;

    let text = format!(
        "🏦 Deposited {}\n\n{}\n🏦 Bank: {}",
        format_money(amount),
        wallet_line(&next),
        format_money(next.bank)
    );
    Ok(Transition::new(next, Outcome::text(text)))
}

fn withdraw(record: &EconomyRecord, amount: Amount) -> Result<Transition, CommandError> {
    let amount = resolve_amount(
        amount,
        record.bank,
        "❌ Your bank account is empty!",
        "❌ Insufficient bank balance!",
    )?;

    let mut next = record.clone();
    next.bank -= amount;
    next.balance += amount;

    let text = format!(
        "💸 Withdrew {}\n\n{}\n🏦 Bank: {}",
        format_money(amount),
        wallet_line(&next),
        format_money(next.bank)
    );
    Ok(Transition::new(next, Outcome::text(text)))
}

/// Catalog grouped by category. Items keep their catalog number so
/// `/buy <number>` matches what is shown.
fn shop_listing() -> Outcome {
    let mut sections: Vec<(&str, Vec<String>)> = Vec::new();
    for (index, item) in ShopItem::iter().enumerate() {
        let spec = item.spec();
        let line = format!(
            "{}. {} - {}\n<i>{}</i>\n",
            index + 1,
            spec.name,
            format_money(item.price()),
            spec.description
        );
        match sections.iter_mut().find(|(category, _)| *category == spec.category) {
            Some((_, lines)) => lines.push(line),
            None => sections.push((spec.category, vec![line])),
        }
    }

    let mut text = String::from("🛍️ <b>Shop</b>\n");
    for (category, lines) in sections {
        text.push_str(&format!("\n<b>{}</b>\n", capitalize(category)));
        for line in lines {
            text.push_str(&line);
        }
    }
    text.push_str("\nUse /buy &lt;item&gt; or /buy &lt;number&gt; to purchase!");
    Outcome::text(text)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn buy(record: &EconomyRecord, item: ShopItem) -> Result<Transition, CommandError> {
    let price = item.price();
    if record.balance < price {
        return Err(CommandError::Precondition(format!(
            "❌ Insufficient balance! {} costs {}, you have {}.",
            item.name(),
            format_money(price),
            format_money(record.balance)
        )));
    }

    let mut next = record.clone();
    next.balance -= price;
    *next.inventory.entry(item).or_insert(0) += 1;

    let text = format!(
        "✅ Purchased {} for {}!\n\n{}",
        item.name(),
        format_money(price),
        wallet_line(&next)
    );
    Ok(Transition::new(next, Outcome::text(text)))
}

fn inventory_listing(record: &EconomyRecord) -> Outcome {
    let owned: Vec<(ShopItem, u32)> = record
        .inventory
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(item, count)| (*item, *count))
        .collect();
    if owned.is_empty() {
        return Outcome::text("📦 Your inventory is empty! Visit /shop to buy items.");
    }

    let mut text = String::from("📦 <b>Inventory</b>\n\n");
    let mut worth = Decimal::ZERO;
    for (item, count) in owned {
        worth += item.price() * Decimal::from(count);
        text.push_str(&format!("{} x{}\n", item.name(), count));
    }
    text.push_str(&format!("\n💰 Total value: {}", format_money(worth)));
    Outcome::text(text)
}

fn job_listing(record: &EconomyRecord) -> Outcome {
    let mut text = format!("💼 <b>Jobs</b>\n\nCurrent job: {}\n\n", title_of(record.job));
    for job in Job::iter() {
        let spec = job.spec();
        let mark = if record.level >= spec.level_requirement {
            "✅"
        } else {
            "🔒"
        };
        text.push_str(&format!(
            "{} {} - {}/shift (Level {})\n<code>/apply {}</code>\n",
            mark,
            spec.name,
            format_money(job.salary()),
            spec.level_requirement,
            job.as_ref()
        ));
    }
    Outcome::text(text)
}

fn apply(record: &EconomyRecord, job: Job) -> Result<Transition, CommandError> {
    let spec = job.spec();
    if record.level < spec.level_requirement {
        return Err(CommandError::Precondition(format!(
            "❌ You need level {} to work as {}! You are level {}.",
            spec.level_requirement, spec.name, record.level
        )));
    }

    let mut next = record.clone();
    next.job = Some(job);

    let text = format!(
        "✅ You're now working as {}!\n\n💵 Salary: {}/shift\n\nUse /work to start earning.",
        spec.name,
        format_money(job.salary())
    );
    Ok(Transition::new(next, Outcome::text(text)))
}

fn crime(record: &EconomyRecord, now: DateTime<Utc>, dice: &mut dyn Dice) -> Result<Transition, CommandError> {
    ensure_ready(record.last_crime, rules::crime_cooldown(), now, CooldownKind::Crime)?;

    let last = Crime::ALL.len() - 1;
    let index = usize::try_from(dice.between(0, Crime::ALL.len() as u64)).unwrap_or(last);
    let spec = Crime::ALL[index.min(last)].spec();
    if let Some(item) = spec.required_item {
        if !record.owns(item) {
            return Err(CommandError::Precondition(format!(
                "❌ You need a {} for {}! Buy one in the /shop.",
                item.name(),
                spec.name
            )));
        }
    }

    let mut next = record.clone();
    next.last_crime = Some(now);

    let outcome = if dice.unit() < spec.success_rate {
        let reward = Decimal::from(dice.between(spec.min_reward, spec.max_reward));
        next.balance += reward;
        let level_up = next.gain_xp(rules::CRIME_XP);
        Outcome::text(format!(
            "🦹 <b>{}</b>\n\nSuccess! You got away with {}!\n✨ +{} XP\n\n{}",
            spec.name,
            format_money(reward),
            rules::CRIME_XP,
            wallet_line(&next)
        ))
        .with_level_up(level_up)
    } else {
        let fine = percent_of(record.balance, u64::from(spec.fine_percent)).min(record.balance);
        next.balance -= fine;
        Outcome::text(format!(
            "👮 <b>{}</b>\n\nYou got caught! Fined {} ({}% of your wallet).\n\n{}",
            spec.name,
            format_money(fine),
            spec.fine_percent,
            wallet_line(&next)
        ))
    };
    Ok(Transition::new(next, outcome))
}

fn rob(
    record: &EconomyRecord,
    target: Option<&str>,
    now: DateTime<Utc>,
    dice: &mut dyn Dice,
) -> Result<Transition, CommandError> {
    ensure_ready(record.last_rob, rules::rob_cooldown(), now, CooldownKind::Rob)?;
    if !record.owns(ShopItem::Gun) {
        return Err(CommandError::Precondition(format!(
            "❌ You need a {} to rob someone! Buy one in the /shop.",
            ShopItem::Gun.name()
        )));
    }

    let victim = target.map(escape_html).unwrap_or_else(|| "a stranger".to_string());
    let share = percent_of(record.balance, rules::ROB_SHARE_PERCENT).min(record.balance);
    let mut next = record.clone();
    next.last_rob = Some(now);

    let outcome = if dice.unit() < rules::ROB_SUCCESS_RATE {
        next.balance += share;
        let level_up = next.gain_xp(rules::ROB_XP);
        Outcome::text(format!(
            "🎭 <b>Robbery Successful</b>\n\nYou robbed {} and got away with {}!\n✨ +{} XP\n\n{}",
            victim,
            format_money(share),
            rules::ROB_XP,
            wallet_line(&next)
        ))
        .with_level_up(level_up)
    } else {
        next.balance -= share;
        Outcome::text(format!(
            "🚔 <b>Busted!</b>\n\nYou tried to rob {} and got caught. Lost {}.\n\n{}",
            victim,
            format_money(share),
            wallet_line(&next)
        ))
    };
    Ok(Transition::new(next, outcome))
}

fn gamble(record: &EconomyRecord, amount: Decimal, dice: &mut dyn Dice) -> Result<Transition, CommandError> {
    let wager = stake(record, amount)?;
    let won = dice.unit() < rules::GAMBLE_WIN_RATE;
    let net = if won { wager } else { -wager };

    let mut next = record.clone();
    next.balance += net;

    let text = if won {
        format!("🎲 You won! +{}\n\n{}", format_money(wager), wallet_line(&next))
    } else {
        format!("💸 You lost! -{}\n\n{}", format_money(wager), wallet_line(&next))
    };
    Ok(Transition::new(next, Outcome::text(text)).with_effect(Effect::GamePlayed {
        game: GameType::Gamble,
        wager,
        net,
        score: u32::from(won),
    }))
}

fn slots(record: &EconomyRecord, amount: Decimal, dice: &mut dyn Dice) -> Result<Transition, CommandError> {
    let wager = stake(record, amount)?;

    let last = SLOT_SYMBOLS.len() - 1;
    let reels = [(); 3].map(|_| {
        usize::try_from(dice.between(0, SLOT_SYMBOLS.len() as u64))
            .unwrap_or(last)
            .min(last)
    });
    let [first, second, third] = reels;
    let multiplier = if first == second && second == third {
        rules::SLOTS_TRIPLE_MULTIPLIER
    } else if first == second || second == third || first == third {
        rules::SLOTS_PAIR_MULTIPLIER
    } else {
        0
    };
    let payout = wager * Decimal::from(multiplier);
    let net = payout - wager;

    let mut next = record.clone();
    next.balance += net;

    let verdict = match multiplier {
        0 => format!("No match. You lost {}.", format_money(wager)),
        m if m == rules::SLOTS_TRIPLE_MULTIPLIER => format!("🎉 JACKPOT! You won {}!", format_money(payout)),
        _ => format!("Two of a kind! You won {}!", format_money(payout)),
    };
    let text = format!(
        "🎰 <b>Slots</b>\n\n[ {} | {} | {} ]\n\n{}\n\n{}",
        SLOT_SYMBOLS[first],
        SLOT_SYMBOLS[second],
        SLOT_SYMBOLS[third],
        verdict,
        wallet_line(&next)
    );
    Ok(Transition::new(next, Outcome::text(text)).with_effect(Effect::GamePlayed {
        game: GameType::Slots,
        wager,
        net,
        score: multiplier,
    }))
}

fn transfer(record: &EconomyRecord, receiver: i64, amount: Decimal) -> Result<Transition, CommandError> {
    if receiver == record.user_id {
        return Err(CommandError::Validation("❌ You can't transfer money to yourself!".into()));
    }
    let amount = stake(record, amount)?;

    let mut next = record.clone();
    next.balance -= amount;

    let text = format!(
        "💸 Sent {} to user <code>{}</code>.\n\n{}",
        format_money(amount),
        receiver,
        wallet_line(&next)
    );
    Ok(Transition::new(next, Outcome::text(text)).with_effect(Effect::Credit {
        user_id: receiver,
        amount,
    }))
}
