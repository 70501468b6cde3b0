//! Static catalogs: shop items, jobs, crimes and slot machine symbols.
//!
//! Every catalog key is a closed enum so unknown keys surface as explicit
//! lookup failures instead of silently missing map entries.

use rust_decimal::Decimal;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Item sold in `/shop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ShopItem {
    Lockpick,
    Gun,
    Knife,
    Car,
    Laptop,
    Phone,
    Mansion,
    Yacht,
    Jet,
    Island,
}

/// Static attributes of a [`ShopItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSpec {
    pub name: &'static str,
    pub price: u64,
    pub description: &'static str,
    pub category: &'static str,
}

impl ShopItem {
    pub const fn spec(self) -> ItemSpec {
        match self {
            ShopItem::Lockpick => ItemSpec {
                name: "🔓 Lockpick",
                price: 5_000,
                description: "Opens doors for jewelry theft and museum heists",
                category: "tools",
            },
            ShopItem::Gun => ItemSpec {
                name: "🔫 Gun",
                price: 25_000,
                description: "Required for robbery and heists",
                category: "weapons",
            },
            ShopItem::Knife => ItemSpec {
                name: "🔪 Knife",
                price: 10_000,
                description: "Looks scary in your inventory",
                category: "weapons",
            },
            ShopItem::Car => ItemSpec {
                name: "🚗 Car",
                price: 100_000,
                description: "Required for grand theft auto",
                category: "vehicles",
            },
            ShopItem::Laptop => ItemSpec {
                name: "💻 Laptop",
                price: 50_000,
                description: "Required for hacking",
                category: "tools",
            },
            ShopItem::Phone => ItemSpec {
                name: "📱 Phone",
                price: 15_000,
                description: "Call backup during crimes",
                category: "tools",
            },
            ShopItem::Mansion => ItemSpec {
                name: "🏰 Mansion",
                price: 1_000_000,
                description: "A status symbol for the leaderboard",
                category: "property",
            },
            ShopItem::Yacht => ItemSpec {
                name: "🛥️ Yacht",
                price: 5_000_000,
                description: "A bigger status symbol",
                category: "property",
            },
            ShopItem::Jet => ItemSpec {
                name: "✈️ Private Jet",
                price: 25_000_000,
                description: "For the very rich",
                category: "property",
            },
            ShopItem::Island => ItemSpec {
                name: "🏝️ Private Island",
                price: 100_000_000,
                description: "The end game",
                category: "property",
            },
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn price(self) -> Decimal {
        Decimal::from(self.spec().price)
    }

    /// Resolves a `/buy` argument: either the item key or its 1-based
    /// position in the shop listing.
    pub fn lookup(arg: &str) -> Option<Self> {
        if let Ok(position) = arg.parse::<usize>() {
            return position.checked_sub(1).and_then(|index| Self::iter().nth(index));
        }
        arg.parse().ok()
    }
}

/// Job a user can apply for with `/apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Job {
    Janitor,
    Cashier,
    Waiter,
    Teacher,
    Mechanic,
    Engineer,
    Doctor,
    Lawyer,
    Pilot,
    Ceo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub name: &'static str,
    pub salary: u64,
    pub level_requirement: u32,
}

/// Title shown for users without a job.
pub const UNEMPLOYED: &str = "Unemployed";

impl Job {
    pub const fn spec(self) -> JobSpec {
        let (name, salary, level_requirement) = match self {
            Job::Janitor => ("🧹 Janitor", 200, 1),
            Job::Cashier => ("💵 Cashier", 500, 3),
            Job::Waiter => ("🍽️ Waiter", 750, 5),
            Job::Teacher => ("👨‍🏫 Teacher", 1_000, 8),
            Job::Mechanic => ("🔧 Mechanic", 1_500, 10),
            Job::Engineer => ("👷 Engineer", 2_500, 15),
            Job::Doctor => ("👨‍⚕️ Doctor", 5_000, 20),
            Job::Lawyer => ("⚖️ Lawyer", 10_000, 30),
            Job::Pilot => ("✈️ Pilot", 15_000, 40),
            Job::Ceo => ("💼 CEO", 25_000, 50),
        };
        JobSpec {
            name,
            salary,
            level_requirement,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn salary(self) -> Decimal {
        Decimal::from(self.spec().salary)
    }
}

/// Salary paid on `/work` for an optional job.
pub fn salary_of(job: Option<Job>) -> Decimal {
    job.map(Job::salary).unwrap_or(Decimal::ZERO)
}

/// Display title for an optional job.
pub fn title_of(job: Option<Job>) -> &'static str {
    job.map(Job::name).unwrap_or(UNEMPLOYED)
}

/// Crime picked at random by `/crime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Crime {
    StoreRobbery,
    BankRobbery,
    JewelryTheft,
    GrandTheftAuto,
    DatabaseHack,
    MuseumHeist,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrimeSpec {
    pub name: &'static str,
    pub min_reward: u64,
    pub max_reward: u64,
    pub success_rate: f64,
    pub required_item: Option<ShopItem>,
    /// Share of the wallet confiscated on failure, in percent.
    pub fine_percent: u32,
}

impl Crime {
    pub const ALL: [Crime; 6] = [
        Crime::StoreRobbery,
        Crime::BankRobbery,
        Crime::JewelryTheft,
        Crime::GrandTheftAuto,
        Crime::DatabaseHack,
        Crime::MuseumHeist,
    ];

    pub const fn spec(self) -> CrimeSpec {
        match self {
            Crime::StoreRobbery => CrimeSpec {
                name: "🏪 Rob a Store",
                min_reward: 1_000,
                max_reward: 5_000,
                success_rate: 0.6,
                required_item: None,
                fine_percent: 15,
            },
            Crime::BankRobbery => CrimeSpec {
                name: "🏦 Rob a Bank",
                min_reward: 10_000,
                max_reward: 50_000,
                success_rate: 0.3,
                required_item: Some(ShopItem::Gun),
                fine_percent: 25,
            },
            Crime::JewelryTheft => CrimeSpec {
                name: "💎 Steal Jewelry",
                min_reward: 5_000,
                max_reward: 25_000,
                success_rate: 0.4,
                required_item: Some(ShopItem::Lockpick),
                fine_percent: 20,
            },
            Crime::GrandTheftAuto => CrimeSpec {
                name: "🚗 Grand Theft Auto",
                min_reward: 15_000,
                max_reward: 75_000,
                success_rate: 0.2,
                required_item: Some(ShopItem::Car),
                fine_percent: 30,
            },
            Crime::DatabaseHack => CrimeSpec {
                name: "💻 Hack Database",
                min_reward: 20_000,
                max_reward: 100_000,
                success_rate: 0.25,
                required_item: Some(ShopItem::Laptop),
                fine_percent: 35,
            },
            Crime::MuseumHeist => CrimeSpec {
                name: "🏛️ Museum Heist",
                min_reward: 50_000,
                max_reward: 250_000,
                success_rate: 0.15,
                required_item: Some(ShopItem::Lockpick),
                fine_percent: 40,
            },
        }
    }
}

/// Reel symbols for `/slots`, drawn uniformly.
pub const SLOT_SYMBOLS: [&str; 6] = ["🍒", "🍋", "🍊", "🍇", "💎", "7️⃣"];
