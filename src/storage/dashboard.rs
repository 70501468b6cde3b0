//! Dashboard accounts: profiles, roles, coin ledger and notifications.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};
use crate::core::types::{Plan, Role};
use crate::storage::db::{decimal_at, format_timestamp, timestamp_at};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub coins: Decimal,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    AdminGrant,
    PlanUpgrade,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub from_user: Option<String>,
    pub to_user: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub kind: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Platform totals shown to admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: usize,
    pub total_bots: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_coins: Decimal,
    pub admins: usize,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

const PROFILE_COLUMNS: &str = "user_id, email, coins, plan, created_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        email: row.get(1)?,
        coins: decimal_at(row, 2)?,
        plan: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
    })
}

/// Registers a dashboard profile. Duplicate ids or emails are a conflict.
pub fn create_profile(conn: &Connection, user_id: &str, email: &str, now: DateTime<Utc>) -> AppResult<Profile> {
    let user_id = user_id.trim();
    let email = email.trim().to_lowercase();
    if user_id.is_empty() {
        return Err(AppError::Validation("userId is required".to_string()));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::Validation(format!("'{}' is not an email address", email)));
    }

    let inserted = conn.execute(
        "INSERT INTO profiles (user_id, email, coins, plan, created_at) VALUES (?1, ?2, '0', ?3, ?4)",
        params![user_id, email, Plan::Free, format_timestamp(now)],
    );
    match inserted {
        Ok(_) => {}
        Err(err) if is_constraint_violation(&err) => {
            return Err(AppError::Conflict(format!("profile {} or email {} already exists", user_id, email)));
        }
        Err(err) => return Err(err.into()),
    }
    log::info!("Registered dashboard profile {}", user_id);

    get_profile(conn, user_id)?.ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
}

pub fn get_profile(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Profile>> {
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLUMNS),
        [user_id],
        profile_from_row,
    )
    .optional()
}

pub fn find_profile_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Profile>> {
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE email = ?1", PROFILE_COLUMNS),
        [email.trim().to_lowercase()],
        profile_from_row,
    )
    .optional()
}

pub fn has_role(conn: &Connection, user_id: &str, role: Role) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2)",
        params![user_id, role],
        |row| row.get(0),
    )
}

/// Grants a role; `false` when the user already had it.
pub fn grant_role(conn: &Connection, user_id: &str, role: Role) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        params![user_id, role],
    )?;
    Ok(inserted > 0)
}

/// Fails with `Forbidden` unless `user_id` is an admin.
pub fn require_admin(conn: &Connection, user_id: &str) -> AppResult<()> {
    if has_role(conn, user_id, Role::Admin)? {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} is not an admin", user_id)))
    }
}

pub fn record_transaction(
    conn: &Connection,
    from_user: Option<&str>,
    to_user: Option<&str>,
    amount: Decimal,
    kind: TransactionKind,
    description: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO transactions (id, from_user, to_user, amount, kind, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            from_user,
            to_user,
            amount.to_string(),
            kind.as_ref(),
            description,
            format_timestamp(now)
        ],
    )?;
    Ok(id)
}

/// Transactions sent or received by a user, newest first.
pub fn list_transactions(conn: &Connection, user_id: &str, limit: usize) -> rusqlite::Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_user, to_user, amount, kind, description, created_at
         FROM transactions
         WHERE from_user = ?1 OR to_user = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], |row| {
        Ok(Transaction {
            id: row.get(0)?,
            from_user: row.get(1)?,
            to_user: row.get(2)?,
            amount: decimal_at(row, 3)?,
            kind: row.get(4)?,
            description: row.get(5)?,
            created_at: timestamp_at(row, 6)?,
        })
    })?;
    rows.collect()
}

pub fn notify(conn: &Connection, user_id: &str, title: &str, message: &str, now: DateTime<Utc>) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, message, is_read, created_at) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![id, user_id, title, message, format_timestamp(now)],
    )?;
    Ok(id)
}

pub fn list_notifications(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, message, is_read, created_at
         FROM notifications WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            message: row.get(3)?,
            is_read: row.get(4)?,
            created_at: timestamp_at(row, 5)?,
        })
    })?;
    rows.collect()
}

pub fn mark_notification_read(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])? > 0)
}

/// One notification per registered profile; returns how many were sent.
pub fn broadcast(conn: &mut Connection, title: &str, message: &str, now: DateTime<Utc>) -> AppResult<usize> {
    if title.trim().is_empty() || message.trim().is_empty() {
        return Err(AppError::Validation("title and message are required".to_string()));
    }
    let tx = conn.transaction()?;
    let recipients: Vec<String> = {
        let mut stmt = tx.prepare("SELECT user_id FROM profiles ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    for user_id in &recipients {
        notify(&tx, user_id, title.trim(), message.trim(), now)?;
    }
    tx.commit()?;
    Ok(recipients.len())
}

/// Adds coins to the profile registered under `email` and records the grant.
pub fn grant_coins(
    conn: &mut Connection,
    admin_id: &str,
    email: &str,
    amount: Decimal,
    now: DateTime<Utc>,
) -> AppResult<Profile> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    let tx = conn.transaction()?;
    let profile = find_profile_by_email(&tx, email)?
        .ok_or_else(|| AppError::NotFound(format!("no profile with email {}", email)))?;

    let coins = profile.coins + amount;
    tx.execute(
        "UPDATE profiles SET coins = ?2 WHERE user_id = ?1",
        params![profile.user_id, coins.to_string()],
    )?;
    record_transaction(
        &tx,
        Some(admin_id),
        Some(&profile.user_id),
        amount,
        TransactionKind::AdminGrant,
        "Coins granted by admin",
        now,
    )?;
    notify(
        &tx,
        &profile.user_id,
        "Coins received",
        &format!("An admin added {} coins to your balance.", amount),
        now,
    )?;
    tx.commit()?;
    log::info!("Admin {} granted {} coins to {}", admin_id, amount, profile.user_id);

    Ok(Profile { coins, ..profile })
}

/// Buys `plan` with the profile's coins. Downgrades and same-plan purchases
/// are conflicts; the new plan propagates to the stats of the owner's bots.
pub fn upgrade_plan(conn: &mut Connection, user_id: &str, plan: Plan, now: DateTime<Utc>) -> AppResult<Profile> {
    let tx = conn.transaction()?;
    let profile = get_profile(&tx, user_id)?.ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;

    if !plan.is_upgrade_from(profile.plan) {
        return Err(AppError::Conflict(format!(
            "cannot move from {} to {}",
            profile.plan.display_name(),
            plan.display_name()
        )));
    }
    let price = plan.price();
    if profile.coins < price {
        return Err(AppError::Validation(format!(
            "{} costs {} coins, balance is {}",
            plan.display_name(),
            price,
            profile.coins
        )));
    }

    let coins = profile.coins - price;
    tx.execute(
        "UPDATE profiles SET coins = ?2, plan = ?3 WHERE user_id = ?1",
        params![user_id, coins.to_string(), plan],
    )?;
    tx.execute(
        "UPDATE bot_stats SET plan = ?2, updated_at = ?3 WHERE bot_id IN (SELECT id FROM bots WHERE owner_id = ?1)",
        params![user_id, plan, format_timestamp(now)],
    )?;
    record_transaction(
        &tx,
        Some(user_id),
        None,
        price,
        TransactionKind::PlanUpgrade,
        &format!("Upgrade to {}", plan.display_name()),
        now,
    )?;
    tx.commit()?;
    log::info!("Profile {} upgraded to {}", user_id, plan);

    Ok(Profile { coins, plan, ..profile })
}

pub fn overview(conn: &Connection) -> AppResult<Overview> {
    let total_users: usize = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
    let total_bots: usize = conn.query_row("SELECT COUNT(*) FROM bots", [], |row| row.get(0))?;
    let admins: usize = conn.query_row(
        "SELECT COUNT(*) FROM user_roles WHERE role = ?1",
        [Role::Admin],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare("SELECT coins FROM profiles")?;
    let coins = stmt.query_map([], |row| decimal_at(row, 0))?;
    let mut total_coins = Decimal::ZERO;
    for amount in coins {
        total_coins += amount?;
    }
    Ok(Overview {
        total_users,
        total_bots,
        total_coins,
        admins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bots::{create_bot, ensure_stats, NewBot};
    use crate::storage::db::test_support::temp_pool;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_profiles_are_unique() {
        let (_dir, pool) = temp_pool();
        let conn = pool.get().unwrap();

        let profile = create_profile(&conn, "u1", "Alice@Example.com", now()).unwrap();
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.plan, Plan::Free);
        assert_eq!(profile.coins, Decimal::ZERO);

        assert!(matches!(create_profile(&conn, "u2", "alice@example.com", now()), Err(AppError::Conflict(_))));
        assert!(matches!(create_profile(&conn, "u3", "nope", now()), Err(AppError::Validation(_))));
        assert!(find_profile_by_email(&conn, " ALICE@example.com").unwrap().is_some());
    }

    #[test]
    fn test_grant_then_upgrade() {
        let (_dir, pool) = temp_pool();
        let mut conn = pool.get().unwrap();
        create_profile(&conn, "admin", "admin@example.com", now()).unwrap();
        create_profile(&conn, "u1", "user@example.com", now()).unwrap();
        let bot = NewBot {
            user_id: "u1".to_string(),
            name: "Bot".to_string(),
            telegram_token: "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw".to_string(),
            channel_username: None,
            bot_image_url: None,
            welcome_message: None,
        };
        create_bot(&mut conn, &bot, "bot-1", now()).unwrap();

        assert!(matches!(
            upgrade_plan(&mut conn, "u1", Plan::Pro, now()),
            Err(AppError::Validation(_))
        ));

        let granted = grant_coins(&mut conn, "admin", "user@example.com", Decimal::from(600), now()).unwrap();
        assert_eq!(granted.coins, Decimal::from(600));

        let upgraded = upgrade_plan(&mut conn, "u1", Plan::Pro, now()).unwrap();
        assert_eq!(upgraded.plan, Plan::Pro);
        assert_eq!(upgraded.coins, Decimal::from(100));
        assert_eq!(ensure_stats(&conn, "bot-1", now()).unwrap().plan, Plan::Pro);
        assert!(matches!(
            upgrade_plan(&mut conn, "u1", Plan::Free, now()),
            Err(AppError::Conflict(_))
        ));

        let kinds: Vec<String> = list_transactions(&conn, "u1", 50)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec!["plan_upgrade", "admin_grant"]);
        assert_eq!(list_notifications(&conn, "u1").unwrap().len(), 1);
    }

    #[test]
    fn test_roles_and_overview() {
        let (_dir, pool) = temp_pool();
        let mut conn = pool.get().unwrap();
        create_profile(&conn, "a", "a@example.com", now()).unwrap();
        create_profile(&conn, "b", "b@example.com", now()).unwrap();

        assert!(matches!(require_admin(&conn, "a"), Err(AppError::Forbidden(_))));
        assert!(grant_role(&conn, "a", Role::Admin).unwrap());
        assert!(!grant_role(&conn, "a", Role::Admin).unwrap());
        require_admin(&conn, "a").unwrap();

        grant_coins(&mut conn, "a", "b@example.com", Decimal::from(250), now()).unwrap();
        assert_eq!(broadcast(&mut conn, "Hello", "Maintenance tonight", now()).unwrap(), 2);

        let notes = list_notifications(&conn, "b").unwrap();
        assert_eq!(notes.len(), 2);
        assert!(mark_notification_read(&conn, &notes[0].id).unwrap());
        assert!(!mark_notification_read(&conn, "missing").unwrap());

        let totals = overview(&conn).unwrap();
        assert_eq!(
            totals,
            Overview {
                total_users: 2,
                total_bots: 0,
                total_coins: Decimal::from(250),
                admins: 1,
            }
        );
    }
}
