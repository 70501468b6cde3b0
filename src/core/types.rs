use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::config::plans;

/// Dashboard subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::Enterprise => "Enterprise",
        }
    }

    /// Maximum number of bots an owner on this plan may run; `None` is unlimited.
    pub fn bot_limit(&self) -> Option<usize> {
        match self {
            Plan::Free => Some(plans::FREE_BOT_LIMIT),
            Plan::Pro => Some(plans::PRO_BOT_LIMIT),
            Plan::Enterprise => None,
        }
    }

    /// Coin price of upgrading to this plan
    pub fn price(&self) -> Decimal {
        match self {
            Plan::Free => Decimal::ZERO,
            Plan::Pro => Decimal::from(plans::PRO_PRICE),
            Plan::Enterprise => Decimal::from(plans::ENTERPRISE_PRICE),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 1,
            Plan::Enterprise => 2,
        }
    }

    pub fn is_upgrade_from(&self, current: Plan) -> bool {
        self.rank() > current.rank()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            _ => Err(format!("Unknown plan: {}", s)),
        }
    }
}

// rusqlite FromSql: read plan from DB text column
impl rusqlite::types::FromSql for Plan {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Plan::from_str(s).map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e))))
    }
}

// rusqlite ToSql: write plan as text to DB
impl rusqlite::types::ToSql for Plan {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
            self.as_str().as_bytes(),
        )))
    }
}

/// Dashboard role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl rusqlite::types::FromSql for Role {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::from_str(s).map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e))))
    }
}

impl rusqlite::types::ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
            self.as_str().as_bytes(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_from_str() {
        assert_eq!(Plan::from_str("free").unwrap(), Plan::Free);
        assert_eq!(Plan::from_str("pro").unwrap(), Plan::Pro);
        assert_eq!(Plan::from_str("enterprise").unwrap(), Plan::Enterprise);
        assert!(Plan::from_str("vip").is_err());
    }

    #[test]
    fn test_plan_limits_and_prices() {
        assert_eq!(Plan::Free.bot_limit(), Some(1));
        assert_eq!(Plan::Pro.bot_limit(), Some(5));
        assert_eq!(Plan::Enterprise.bot_limit(), None);
        assert_eq!(Plan::Pro.price(), Decimal::from(500));
        assert_eq!(Plan::Enterprise.price(), Decimal::from(2_000));
    }

    #[test]
    fn test_plan_upgrade_order() {
        assert!(Plan::Pro.is_upgrade_from(Plan::Free));
        assert!(Plan::Enterprise.is_upgrade_from(Plan::Pro));
        assert!(!Plan::Free.is_upgrade_from(Plan::Pro));
        assert!(!Plan::Pro.is_upgrade_from(Plan::Pro));
    }

    #[test]
    fn test_plan_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Plan::Enterprise).unwrap(), "\"enterprise\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
