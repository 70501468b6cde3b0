use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::catalog::{Job, ShopItem};
use crate::core::config::economy::{STARTING_BALANCE, XP_PER_LEVEL};

/// Owned item counts. Counts only ever grow.
pub type Inventory = BTreeMap<ShopItem, u32>;

/// Economy state of one user inside one bot.
#[derive(Debug, Clone, PartialEq)]
pub struct EconomyRecord {
    pub bot_id: String,
    pub user_id: i64,
    pub balance: Decimal,
    pub bank: Decimal,
    pub xp: u64,
    pub level: u32,
    pub inventory: Inventory,
    pub job: Option<Job>,
    pub last_daily: Option<DateTime<Utc>>,
    pub last_work: Option<DateTime<Utc>>,
    pub last_crime: Option<DateTime<Utc>>,
    pub last_rob: Option<DateTime<Utc>>,
    pub total_messages: u64,
}

/// Level reached with `xp` experience points.
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL).unwrap_or(u32::MAX - 1) + 1
}

impl EconomyRecord {
    /// Fresh account with the starting balance.
    pub fn new(bot_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            bot_id: bot_id.into(),
            user_id,
            balance: Decimal::from(STARTING_BALANCE),
            bank: Decimal::ZERO,
            xp: 0,
            level: 1,
            inventory: Inventory::new(),
            job: None,
            last_daily: None,
            last_work: None,
            last_crime: None,
            last_rob: None,
            total_messages: 0,
        }
    }

    pub fn net_worth(&self) -> Decimal {
        self.balance + self.bank
    }

    pub fn owns(&self, item: ShopItem) -> bool {
        self.inventory.get(&item).is_some_and(|count| *count > 0)
    }

    /// Adds experience and recomputes the level.
    ///
    /// Returns the new level when it went up.
    pub fn gain_xp(&mut self, amount: u64) -> Option<u32> {
        self.xp = self.xp.saturating_add(amount);
        let level = level_for_xp(self.xp);
        if level > self.level {
            self.level = level;
            Some(level)
        } else {
            None
        }
    }
}

/// Partial update of an [`EconomyRecord`]; `None` fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EconomyPatch {
    pub balance: Option<Decimal>,
    pub bank: Option<Decimal>,
    pub xp: Option<u64>,
    pub level: Option<u32>,
    pub inventory: Option<Inventory>,
    pub job: Option<Job>,
    pub last_daily: Option<DateTime<Utc>>,
    pub last_work: Option<DateTime<Utc>>,
    pub last_crime: Option<DateTime<Utc>>,
    pub last_rob: Option<DateTime<Utc>>,
    pub total_messages: Option<u64>,
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    (before != after).then(|| after.clone())
}

impl EconomyPatch {
    /// Fields that differ between two versions of the same record.
    pub fn diff(before: &EconomyRecord, after: &EconomyRecord) -> Self {
        Self {
            balance: changed(&before.balance, &after.balance),
            bank: changed(&before.bank, &after.bank),
            xp: changed(&before.xp, &after.xp),
            level: changed(&before.level, &after.level),
            inventory: changed(&before.inventory, &after.inventory),
            job: changed(&before.job, &after.job).flatten(),
            last_daily: changed(&before.last_daily, &after.last_daily).flatten(),
            last_work: changed(&before.last_work, &after.last_work).flatten(),
            last_crime: changed(&before.last_crime, &after.last_crime).flatten(),
            last_rob: changed(&before.last_rob, &after.last_rob).flatten(),
            total_messages: changed(&before.total_messages, &after.total_messages),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, record: &mut EconomyRecord) {
        if let Some(balance) = self.balance {
            record.balance = balance;
        }
        if let Some(bank) = self.bank {
            record.bank = bank;
        }
        if let Some(xp) = self.xp {
            record.xp = xp;
        }
        if let Some(level) = self.level {
            record.level = level;
        }
        if let Some(inventory) = &self.inventory {
            record.inventory = inventory.clone();
        }
        if let Some(job) = self.job {
            record.job = Some(job);
        }
        if let Some(at) = self.last_daily {
            record.last_daily = Some(at);
        }
        if let Some(at) = self.last_work {
            record.last_work = Some(at);
        }
        if let Some(at) = self.last_crime {
            record.last_crime = Some(at);
        }
        if let Some(at) = self.last_rob {
            record.last_rob = Some(at);
        }
        if let Some(total) = self.total_messages {
            record.total_messages = total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(102), 2);
        assert_eq!(level_for_xp(4_999), 50);
    }

    #[test]
    fn test_gain_xp_reports_level_up_once() {
        let mut record = EconomyRecord::new("bot", 1);
        record.xp = 97;
        assert_eq!(record.gain_xp(5), Some(2));
        assert_eq!(record.xp, 102);
        assert_eq!(record.level, 2);
        assert_eq!(record.gain_xp(5), None);
    }

    #[test]
    fn test_patch_diff_and_apply() {
        let before = EconomyRecord::new("bot", 1);
        let mut after = before.clone();
        after.balance = Decimal::from(600);
        after.bank = Decimal::from(400);
        after.inventory.insert(ShopItem::Gun, 1);

        let patch = EconomyPatch::diff(&before, &after);
        assert_eq!(patch.balance, Some(Decimal::from(600)));
        assert_eq!(patch.xp, None);
        assert!(patch.last_work.is_none());

        let mut replayed = before.clone();
        patch.apply(&mut replayed);
        assert_eq!(replayed, after);
        assert!(EconomyPatch::diff(&after, &after).is_empty());
    }
}
