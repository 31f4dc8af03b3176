//! Live-channel dispatch tests against a real store.
//!
//! These drive `handle_command` directly with registered registry
//! connections, covering membership gating on join and send, the silent
//! drop policy, and fan-out of persisted messages.

mod common;

use axum::extract::ws::Message;
use common::{seed_user, test_state};
use relay_api::ws::dispatch::handle_command;
use relay_api::ws::events::ClientCommand;
use relay_core::types::DbId;
use relay_db::models::user::UserSummary;
use relay_db::repositories::ChatRepo;
use sqlx::PgPool;

fn summary(id: DbId, username: &str) -> UserSummary {
    UserSummary {
        id,
        username: username.to_string(),
        avatar: String::new(),
        is_online: true,
        last_seen: None,
    }
}

fn send_cmd(chat_id: DbId, content: &str) -> ClientCommand {
    ClientCommand::SendMessage {
        chat_id,
        content: content.to_string(),
        attachments: Vec::new(),
    }
}

fn as_json(msg: &Message) -> serde_json::Value {
    match msg {
        Message::Text(text) => serde_json::from_str(text).expect("valid JSON frame"),
        other => panic!("Expected Text frame, got: {other:?}"),
    }
}

async fn message_count(pool: &PgPool, chat_id: DbId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .expect("count query should succeed")
}

// ---------------------------------------------------------------------------
// Test: join is denied for a non-member
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn join_is_denied_for_non_member(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let mallory = seed_user(&pool, "mallory", "mallory@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let state = test_state(pool);
    let (_rx, _) = state.registry.register("conn-m".to_string(), mallory).await;

    handle_command(
        &state,
        "conn-m",
        &summary(mallory, "mallory"),
        ClientCommand::JoinChat { chat_id: chat.id },
    )
    .await;

    assert!(!state.registry.is_in_room("conn-m", chat.id).await);
    assert_eq!(state.registry.room_size(chat.id).await, 0);
}

// ---------------------------------------------------------------------------
// Test: a non-member's send is dropped, nothing persisted
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn non_member_send_is_dropped(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let mallory = seed_user(&pool, "mallory", "mallory@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let state = test_state(pool.clone());
    let (mut rx, _) = state.registry.register("conn-m".to_string(), mallory).await;

    handle_command(
        &state,
        "conn-m",
        &summary(mallory, "mallory"),
        send_cmd(chat.id, "let me in"),
    )
    .await;

    assert_eq!(message_count(&pool, chat.id).await, 0);
    // Silent drop: no error frame comes back either.
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: whitespace-only content is dropped before any store access
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn blank_send_is_dropped(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let state = test_state(pool.clone());
    let (_rx, _) = state.registry.register("conn-a".to_string(), alice).await;
    handle_command(
        &state,
        "conn-a",
        &summary(alice, "alice"),
        ClientCommand::JoinChat { chat_id: chat.id },
    )
    .await;

    handle_command(
        &state,
        "conn-a",
        &summary(alice, "alice"),
        send_cmd(chat.id, "   "),
    )
    .await;

    assert_eq!(message_count(&pool, chat.id).await, 0);
}

// ---------------------------------------------------------------------------
// Test: a member's send persists and fans out to the whole room,
// sender included
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn member_send_persists_and_fans_out(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let state = test_state(pool.clone());
    let (mut rx_a, _) = state.registry.register("conn-a".to_string(), alice).await;
    let (mut rx_b, _) = state.registry.register("conn-b".to_string(), bob).await;

    let alice_summary = summary(alice, "alice");
    handle_command(
        &state,
        "conn-a",
        &alice_summary,
        ClientCommand::JoinChat { chat_id: chat.id },
    )
    .await;
    handle_command(
        &state,
        "conn-b",
        &summary(bob, "bob"),
        ClientCommand::JoinChat { chat_id: chat.id },
    )
    .await;

    handle_command(&state, "conn-a", &alice_summary, send_cmd(chat.id, "hello")).await;

    assert_eq!(message_count(&pool, chat.id).await, 1);

    let to_alice = as_json(&rx_a.try_recv().expect("sender's connection receives too"));
    let to_bob = as_json(&rx_b.try_recv().expect("room member receives"));

    assert_eq!(to_alice["type"], "receive_message");
    assert_eq!(to_alice["message"]["content"], "hello");
    assert_eq!(to_alice["message"]["sender"]["id"], alice);
    assert_eq!(to_alice["message"]["read_by"], serde_json::json!([alice]));
    // Identical payload on every connection, server-assigned id included.
    assert_eq!(to_alice, to_bob);

    // Exactly once per connection.
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}
