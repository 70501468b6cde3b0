//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use econbot::core::{AppError, AppResult};
use econbot::economy::{EconomyService, ScriptedDice};
use econbot::storage::bots::{self, Bot, NewBot};
use econbot::storage::{create_pool, DbPool, SqliteEconomyStore};
use econbot::telegram::{ChatGateway, Outbound};
use econbot::web::{router, AppState};

pub const TEST_TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";
pub const BOT_USERNAME: &str = "econ_test_bot";

/// What the gateway answers to membership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    Outsider,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub token: String,
    pub chat_id: i64,
    pub message: Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub callback_id: String,
    pub text: String,
    pub alert: bool,
}

/// Gateway that records every call instead of talking to Telegram.
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    answers: Mutex<Vec<Answer>>,
    webhooks: Mutex<Vec<(String, String)>>,
    forgotten: Mutex<Vec<String>>,
    membership: Mutex<Membership>,
    failing: AtomicBool,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            webhooks: Mutex::new(Vec::new()),
            forgotten: Mutex::new(Vec::new()),
            membership: Mutex::new(Membership::Member),
            failing: AtomicBool::new(false),
        }
    }
}

impl RecordingGateway {
    pub fn set_membership(&self, membership: Membership) {
        *self.membership.lock().unwrap() = membership;
    }

    /// Makes every outbound call fail with an upstream error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_sent(&self) -> Option<Sent> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap().clone()
    }

    pub fn webhooks(&self) -> Vec<(String, String)> {
        self.webhooks.lock().unwrap().clone()
    }

    /// Tokens the service told the gateway to drop.
    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.answers.lock().unwrap().clear();
    }

    /// Waits for messages sent from spawned tasks.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Sent> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.sent()
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::Upstream("gateway offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send(&self, token: &str, chat_id: i64, message: Outbound) -> AppResult<()> {
        self.check()?;
        self.sent.lock().unwrap().push(Sent {
            token: token.to_string(),
            chat_id,
            message,
        });
        Ok(())
    }

    async fn is_member(&self, _token: &str, _channel: &str, _user_id: i64) -> AppResult<bool> {
        match *self.membership.lock().unwrap() {
            Membership::Member => Ok(true),
            Membership::Outsider => Ok(false),
            Membership::Unreachable => Err(AppError::Upstream("getChatMember timed out".to_string())),
        }
    }

    async fn answer_callback(&self, _token: &str, callback_id: &str, text: &str, alert: bool) -> AppResult<()> {
        self.check()?;
        self.answers.lock().unwrap().push(Answer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
            alert,
        });
        Ok(())
    }

    async fn bot_username(&self, _token: &str) -> AppResult<String> {
        self.check()?;
        Ok(BOT_USERNAME.to_string())
    }

    async fn set_webhook(&self, token: &str, url: &str) -> AppResult<()> {
        self.check()?;
        self.webhooks.lock().unwrap().push((token.to_string(), url.to_string()));
        Ok(())
    }

    fn forget(&self, token: &str) {
        self.forgotten.lock().unwrap().push(token.to_string());
    }
}

/// Service wired to a temporary database and a recording gateway.
pub struct TestApp {
    _dir: TempDir,
    pub pool: DbPool,
    pub gateway: Arc<RecordingGateway>,
    pub economy: EconomyService,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_dice(ScriptedDice::new())
    }

    pub fn with_dice(dice: ScriptedDice) -> Self {
        Self::build(dice, Some("https://bots.example.com".to_string()))
    }

    pub fn without_public_url() -> Self {
        Self::build(ScriptedDice::new(), None)
    }

    fn build(dice: ScriptedDice, public_url: Option<String>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("econbot.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let store = Arc::new(SqliteEconomyStore::new(pool.clone()));
        let economy = EconomyService::with_dice(store, Box::new(dice));
        let gateway = Arc::new(RecordingGateway::default());
        let state = AppState::new(pool.clone(), economy.clone(), gateway.clone(), public_url);
        Self {
            _dir: dir,
            pool,
            gateway,
            economy,
            state,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Inserts an active bot owned by `owner`.
    pub fn seed_bot(&self, owner: &str, channel: Option<&str>) -> Bot {
        let mut conn = self.pool.get().unwrap();
        let new = NewBot {
            user_id: owner.to_string(),
            name: "Econ Test".to_string(),
            telegram_token: TEST_TOKEN.to_string(),
            channel_username: channel.map(str::to_string),
            bot_image_url: None,
            welcome_message: None,
        }
        .validated()
        .unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        bots::create_bot(&mut conn, &new, &id, chrono::Utc::now()).unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Posts a body as-is, without a content type.
    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Delivers a text message to the bot's webhook.
    pub async fn say(&self, bot: &Bot, chat: Chat, user_id: i64, text: &str) -> (StatusCode, Value) {
        let uri = format!("/api/telegram/webhook/{}", bot.id);
        self.post(&uri, message_update(chat, user_id, text)).await
    }

    /// Text of the newest message the bot sent.
    pub fn last_reply(&self) -> String {
        self.gateway
            .last_sent()
            .map(|sent| sent.message.body().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Chat {
    Private,
    Group(i64),
}

pub fn message_update(chat: Chat, user_id: i64, text: &str) -> Value {
    let chat = match chat {
        Chat::Private => json!({ "id": user_id, "type": "private" }),
        Chat::Group(id) => json!({ "id": id, "type": "supergroup", "title": "Test group" }),
    };
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "date": 1_760_000_000,
            "chat": chat,
            "from": { "id": user_id, "is_bot": false, "first_name": "Alice", "username": "alice" },
            "text": text
        }
    })
}

pub fn callback_update(callback_id: &str, user_id: i64, data: &str) -> Value {
    json!({
        "update_id": 2,
        "callback_query": {
            "id": callback_id,
            "from": { "id": user_id, "is_bot": false, "first_name": "Alice" },
            "chat_instance": "1",
            "message": {
                "message_id": 11,
                "date": 1_760_000_000,
                "chat": { "id": user_id, "type": "private" },
                "text": "Economy"
            },
            "data": data
        }
    })
}
