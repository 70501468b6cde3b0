//! Profile, notification, transaction and admin endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::bots::required;
use super::AppState;
use crate::core::config::plans::TRANSACTION_PAGE;
use crate::core::error::{AppError, AppResult};
use crate::core::types::Plan;
use crate::storage::dashboard::{self, Notification, Overview, Profile, Transaction};
use crate::storage::run_blocking;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuery {
    pub admin_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub admin_id: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub admin_id: String,
    pub title: String,
    pub message: String,
}

pub async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<NewProfile>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = run_blocking(&state.pool, move |conn| {
        dashboard::create_profile(conn, &body.user_id, &body.email, Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_profile(State(state): State<AppState>, Path(user_id): Path<String>) -> AppResult<Json<Profile>> {
    let profile = run_blocking(&state.pool, move |conn| {
        dashboard::get_profile(conn, &user_id)?.ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
    })
    .await?;
    Ok(Json(profile))
}

pub async fn upgrade_plan(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpgradeRequest>,
) -> AppResult<Json<Profile>> {
    let profile = run_blocking(&state.pool, move |conn| {
        dashboard::upgrade_plan(conn, &user_id, body.plan, Utc::now())
    })
    .await?;
    Ok(Json(profile))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let user_id = required(query.user_id, "userId")?;
    let notes = run_blocking(&state.pool, move |conn| Ok(dashboard::list_notifications(conn, &user_id)?)).await?;
    Ok(Json(notes))
}

pub async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    run_blocking(&state.pool, move |conn| {
        if dashboard::mark_notification_read(conn, &id)? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("notification {}", id)))
        }
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<Transaction>>> {
    let user_id = required(query.user_id, "userId")?;
    let rows = run_blocking(&state.pool, move |conn| {
        Ok(dashboard::list_transactions(conn, &user_id, TRANSACTION_PAGE)?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn admin_overview(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> AppResult<Json<Overview>> {
    let admin_id = required(query.admin_id, "adminId")?;
    let totals = run_blocking(&state.pool, move |conn| {
        dashboard::require_admin(conn, &admin_id)?;
        dashboard::overview(conn)
    })
    .await?;
    Ok(Json(totals))
}

pub async fn admin_grant(State(state): State<AppState>, Json(body): Json<GrantRequest>) -> AppResult<Json<Profile>> {
    let profile = run_blocking(&state.pool, move |conn| {
        dashboard::require_admin(conn, &body.admin_id)?;
        dashboard::grant_coins(conn, &body.admin_id, &body.email, body.amount, Utc::now())
    })
    .await?;
    Ok(Json(profile))
}

pub async fn admin_broadcast(
    State(state): State<AppState>,
    Json(body): Json<BroadcastRequest>,
) -> AppResult<Json<Value>> {
    let admin_id = body.admin_id.clone();
    let sent = run_blocking(&state.pool, move |conn| {
        dashboard::require_admin(conn, &body.admin_id)?;
        dashboard::broadcast(conn, &body.title, &body.message, Utc::now())
    })
    .await?;
    log::info!("Admin {} broadcast a notification to {} profile(s)", admin_id, sent);
    Ok(Json(json!({ "sent": sent })))
}
