//! Telegram webhook: command dispatch, channel gating and callbacks
//!
//! Run with: cargo test --test webhook_test

mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;

use common::{callback_update, Chat, Membership, TestApp, TEST_TOKEN};
use econbot::core::metrics::MEMBERSHIP_DENIED_TOTAL;
use econbot::economy::{Button, EconomyRecord, ScriptedDice};
use econbot::storage::EconomyStore;
use econbot::telegram::Outbound;

const ALICE: i64 = 1001;
const BOB: i64 = 1002;

#[tokio::test]
async fn test_start_opens_account_and_welcomes() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);

    let (status, body) = app.say(&bot, Chat::Private, ALICE, "/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let sent = app.gateway.last_sent().unwrap();
    assert_eq!(sent.token, TEST_TOKEN);
    assert_eq!(sent.chat_id, ALICE);
    assert!(sent.message.body().contains("Welcome to the Bot!"));

    app.say(&bot, Chat::Private, ALICE, "/balance").await;
    assert!(app.last_reply().contains("Wallet: $1,000"));
    assert_eq!(
        app.gateway.last_sent().unwrap().message.buttons()[0],
        vec![
            Button::callback("🏦 Deposit", "deposit_prompt"),
            Button::callback("💸 Withdraw", "withdraw_prompt"),
        ]
    );

    let (_, stats) = app.get(&format!("/api/bots/{}/stats", bot.id)).await;
    assert_eq!(stats["stats"]["totalUsers"], 1);
    assert_eq!(stats["stats"]["totalCommands"], 2);
}

#[tokio::test]
async fn test_start_with_image_sends_photo() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    let (status, _) = app
        .request(
            axum::http::Method::PATCH,
            &format!("/api/bots/{}", bot.id),
            Some(json!({ "botImageUrl": "https://cdn.example.com/econ.png", "welcomeMessage": "Hi <there>" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.say(&bot, Chat::Private, ALICE, "/start").await;
    match app.gateway.last_sent().unwrap().message {
        Outbound::Photo { url, caption, .. } => {
            assert_eq!(url, "https://cdn.example.com/econ.png");
            assert!(caption.starts_with("Hi &lt;there&gt;"));
        }
        other => panic!("expected a photo, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_or_inactive_bot_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/telegram/webhook/missing", common::message_update(Chat::Private, ALICE, "/start"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Bot not found or inactive" }));

    let bot = app.seed_bot("owner-1", None);
    app.request(
        axum::http::Method::PATCH,
        &format!("/api/bots/{}", bot.id),
        Some(json!({ "isActive": false })),
    )
    .await;
    let (status, _) = app.say(&bot, Chat::Private, ALICE, "/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.gateway.sent().is_empty());
}

#[tokio::test]
async fn test_gateway_failure_still_acknowledges() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    app.gateway.set_failing(true);

    let (status, body) = app.say(&bot, Chat::Private, ALICE, "/daily").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    // The reward was still paid out
    app.gateway.set_failing(false);
    app.say(&bot, Chat::Private, ALICE, "/balance").await;
    assert!(app.last_reply().contains("Wallet: $2,200"), "{}", app.last_reply());
}

#[tokio::test]
async fn test_undecodable_update_is_acknowledged() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    let (status, body) = app
        .post(&format!("/api/telegram/webhook/{}", bot.id), json!({ "message": "garbage" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    assert!(app.gateway.sent().is_empty());

    let (status, body) = app
        .post_raw(&format!("/api/telegram/webhook/{}", bot.id), "not json at all")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (status, _) = app.post_raw("/api/telegram/webhook/missing", "not json at all").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_outsiders_get_join_prompt() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", Some("@econ_news"));
    app.gateway.set_membership(Membership::Outsider);

    for command in ["/balance", "/help", "/frobnicate", "/deposit"] {
        app.say(&bot, Chat::Private, ALICE, command).await;
        let sent = app.gateway.last_sent().unwrap();
        assert!(sent.message.body().contains("Join Required"), "{}: {}", command, sent.message.body());
        assert_eq!(
            sent.message.buttons(),
            &[
                vec![Button::url("Join Channel ✨", "https://t.me/econ_news")],
                vec![Button::callback("✅ I Joined", "verify_membership")],
            ]
        );
    }

    // /start is never gated
    app.say(&bot, Chat::Private, ALICE, "/start").await;
    assert!(app.last_reply().contains("Welcome to the Bot!"));
}

#[tokio::test]
#[serial]
async fn test_membership_check_failure_denies() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", Some("econ_news"));
    app.gateway.set_membership(Membership::Unreachable);
    let denied = MEMBERSHIP_DENIED_TOTAL.get();

    app.say(&bot, Chat::Private, ALICE, "/daily").await;
    assert!(app.last_reply().contains("Join Required"));
    assert_eq!(MEMBERSHIP_DENIED_TOTAL.get(), denied + 1.0);
    assert!(app.economy.store().get(&bot.id, ALICE).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_verify_membership_callback() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", Some("econ_news"));
    let uri = format!("/api/telegram/webhook/{}", bot.id);

    app.gateway.set_membership(Membership::Outsider);
    let (status, _) = app.post(&uri, callback_update("cb-1", ALICE, "verify_membership")).await;
    assert_eq!(status, StatusCode::OK);
    let answer = app.gateway.answers().pop().unwrap();
    assert_eq!(answer.callback_id, "cb-1");
    assert_eq!(answer.text, "❌ You haven't joined the channel yet!");
    assert!(answer.alert);
    assert!(app.gateway.sent().is_empty());

    app.gateway.set_membership(Membership::Member);
    app.post(&uri, callback_update("cb-2", ALICE, "verify_membership")).await;
    let answer = app.gateway.answers().pop().unwrap();
    assert_eq!(answer.text, "✅ Verified! You can now use the bot.");
    assert!(app.last_reply().contains("Membership verified"));
}

#[tokio::test]
async fn test_deposit_prompt_callback_answers_hint() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    app.post(
        &format!("/api/telegram/webhook/{}", bot.id),
        callback_update("cb-9", ALICE, "deposit_prompt"),
    )
    .await;
    let answer = app.gateway.answers().pop().unwrap();
    assert_eq!(answer.text, "Use /deposit <amount> or /deposit all");
    assert!(!answer.alert);
}

#[tokio::test]
async fn test_missing_arguments_reply_with_usage() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);

    app.say(&bot, Chat::Private, ALICE, "/deposit").await;
    assert!(app.last_reply().contains("/deposit"));

    app.say(&bot, Chat::Private, ALICE, "/frobnicate").await;
    assert_eq!(app.last_reply(), "❌ Unknown command! Use /help to see all commands");
}

#[tokio::test]
async fn test_daily_cooldown() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);

    app.say(&bot, Chat::Private, ALICE, "/daily").await;
    assert!(app.last_reply().contains("Daily Reward"));
    assert!(app.last_reply().contains("+$1,200"));

    app.say(&bot, Chat::Private, ALICE, "/daily").await;
    assert!(app.last_reply().contains("Available in"), "{}", app.last_reply());
}

#[tokio::test]
async fn test_transfer_between_users() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    app.say(&bot, Chat::Private, ALICE, "/start").await;

    app.say(&bot, Chat::Private, ALICE, &format!("/transfer {} 300", BOB)).await;
    assert_eq!(app.last_reply(), "❌ User not found! They need to use the bot first.");

    app.say(&bot, Chat::Private, BOB, "/start").await;
    app.say(&bot, Chat::Private, ALICE, &format!("/transfer {} 300", BOB)).await;
    assert!(app.last_reply().contains("Sent $300"), "{}", app.last_reply());

    app.say(&bot, Chat::Private, BOB, "/balance").await;
    assert!(app.last_reply().contains("Wallet: $1,300"));
    app.say(&bot, Chat::Private, ALICE, "/balance").await;
    assert!(app.last_reply().contains("Wallet: $700"));

    app.say(&bot, Chat::Private, ALICE, &format!("/transfer {} 300", ALICE)).await;
    assert_eq!(app.last_reply(), "❌ You can't transfer money to yourself!");
}

#[tokio::test]
async fn test_command_addressed_to_bot_in_group() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);

    app.say(&bot, Chat::Group(-100_500), ALICE, "/balance@econ_test_bot").await;
    let sent = app.gateway.last_sent().unwrap();
    assert_eq!(sent.chat_id, -100_500);
    assert!(sent.message.body().contains("Wallet: $1,000"));

    let (_, stats) = app.get(&format!("/api/bots/{}/stats", bot.id)).await;
    assert_eq!(stats["stats"]["totalGroups"], 1);
}

#[tokio::test]
async fn test_command_for_another_bot_is_ignored() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);

    let (status, body) = app
        .say(&bot, Chat::Group(-100_500), ALICE, "/daily@some_other_bot")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    assert!(app.gateway.sent().is_empty());
    assert!(app.economy.store().get(&bot.id, ALICE).await.unwrap().is_none());

    // Usernames compare case-insensitively
    app.say(&bot, Chat::Group(-100_500), ALICE, "/daily@Econ_Test_Bot").await;
    assert!(app.last_reply().contains("Daily Reward"));
}

#[tokio::test]
async fn test_group_chatter_levels_up_existing_accounts() {
    let app = TestApp::with_dice(ScriptedDice::new().with_integers([5, 5]));
    let bot = app.seed_bot("owner-1", None);

    // No account yet: chatter is ignored
    app.say(&bot, Chat::Group(-42), BOB, "hello there").await;
    assert!(app.economy.store().get(&bot.id, BOB).await.unwrap().is_none());

    let mut record = EconomyRecord::new(bot.id.clone(), ALICE);
    record.xp = 95;
    app.economy.store().create(record).await.unwrap();

    let (status, _) = app.say(&bot, Chat::Group(-42), ALICE, "gm everyone").await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.gateway.wait_for_sent(1).await;
    assert_eq!(sent.len(), 1);
    match &sent[0].message {
        Outbound::Animation { caption, .. } => {
            assert!(caption.contains("LEVEL UP!"));
            assert!(caption.contains("Alice reached Level 2!"));
        }
        other => panic!("expected an animation, got {:?}", other),
    }

    let record = app.economy.store().get(&bot.id, ALICE).await.unwrap().unwrap();
    assert_eq!(record.xp, 100);
    assert_eq!(record.level, 2);
    assert_eq!(record.total_messages, 1);
}

#[tokio::test]
async fn test_slots_session_is_queryable() {
    let app = TestApp::with_dice(ScriptedDice::new().with_integers([0, 0, 0]));
    let bot = app.seed_bot("owner-1", None);

    app.say(&bot, Chat::Private, ALICE, "/slots 100").await;
    assert!(app.last_reply().contains("JACKPOT"), "{}", app.last_reply());

    let (status, session) = app
        .get(&format!("/api/minigames/slots/session?userId={}&botId={}", ALICE, bot.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["gameType"], "slots");
    assert_eq!(session["userId"], ALICE);
    assert_eq!(session["coinsEarned"], 900.0);

    let (_, none) = app
        .get(&format!("/api/minigames/gamble/session?userId={}", ALICE))
        .await;
    assert_eq!(none, serde_json::Value::Null);

    let (status, _) = app.get("/api/minigames/poker/session?userId=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaderboard_and_rank() {
    let app = TestApp::new();
    let bot = app.seed_bot("owner-1", None);
    app.say(&bot, Chat::Private, ALICE, "/daily").await;
    app.say(&bot, Chat::Private, BOB, "/start").await;

    app.say(&bot, Chat::Private, BOB, "/leaderboard").await;
    let board = app.last_reply();
    let alice_at = board.find(&ALICE.to_string()).unwrap();
    let bob_at = board.find(&BOB.to_string()).unwrap();
    assert!(alice_at < bob_at, "{}", board);

    app.say(&bot, Chat::Private, BOB, "/rank").await;
    assert!(app.last_reply().contains("#2"), "{}", app.last_reply());
}
