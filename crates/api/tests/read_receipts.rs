//! Read-receipt persistence tests.
//!
//! The read-by set must be monotone and duplicate-free: repeated receipts
//! change nothing, and receipts never attach to messages outside the
//! claimed chat.

mod common;

use common::seed_user;
use relay_core::types::DbId;
use relay_db::models::message::{CreateMessage, Message};
use relay_db::repositories::{ChatRepo, MessageRepo};
use sqlx::PgPool;

async fn send_text(pool: &PgPool, chat_id: DbId, sender_id: DbId, content: &str) -> Message {
    MessageRepo::create(
        pool,
        &CreateMessage {
            chat_id,
            sender_id,
            content: content.to_string(),
            attachments: Vec::new(),
        },
    )
    .await
    .expect("message insert should succeed")
}

// ---------------------------------------------------------------------------
// Test: a fresh message is read by its sender only
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn new_message_is_read_by_sender_only(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let message = send_text(&pool, chat.id, alice, "hi").await;

    let rows = MessageRepo::read_by_for(&pool, &[message.id]).await.unwrap();
    assert_eq!(rows, vec![(message.id, alice)]);
}

// ---------------------------------------------------------------------------
// Test: repeated mark_read leaves the set unchanged
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn repeated_mark_read_keeps_the_set_stable(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let m1 = send_text(&pool, chat.id, alice, "one").await;
    let m2 = send_text(&pool, chat.id, alice, "two").await;
    let ids = [m1.id, m2.id];

    let first = MessageRepo::mark_read(&pool, chat.id, &ids, bob).await.unwrap();
    assert_eq!(first, 2, "Both messages are new to bob");

    let second = MessageRepo::mark_read(&pool, chat.id, &ids, bob).await.unwrap();
    assert_eq!(second, 0, "Re-reading inserts nothing");

    // Each message is read by exactly {alice, bob}, no duplicates.
    let rows = MessageRepo::read_by_for(&pool, &ids).await.unwrap();
    assert_eq!(rows.len(), 4);
    for id in ids {
        let mut readers: Vec<_> = rows
            .iter()
            .filter(|(m, _)| *m == id)
            .map(|(_, u)| *u)
            .collect();
        readers.sort_unstable();
        assert_eq!(readers, vec![alice, bob]);
    }
}

// ---------------------------------------------------------------------------
// Test: the sender's own receipt is already present and stays put
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn sender_receipt_survives_a_redundant_mark(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let chat = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();

    let message = send_text(&pool, chat.id, alice, "hi").await;

    let inserted = MessageRepo::mark_read(&pool, chat.id, &[message.id], alice)
        .await
        .unwrap();
    assert_eq!(inserted, 0, "Sender was recorded at creation");

    let rows = MessageRepo::read_by_for(&pool, &[message.id]).await.unwrap();
    assert_eq!(rows, vec![(message.id, alice)]);
}

// ---------------------------------------------------------------------------
// Test: message ids outside the claimed chat are ignored
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn mark_read_ignores_messages_outside_the_chat(pool: PgPool) {
    let alice = seed_user(&pool, "alice", "alice@example.com").await;
    let bob = seed_user(&pool, "bob", "bob@example.com").await;
    let carol = seed_user(&pool, "carol", "carol@example.com").await;
    let chat_ab = ChatRepo::create_direct(&pool, alice, bob).await.unwrap();
    let chat_ac = ChatRepo::create_direct(&pool, alice, carol).await.unwrap();

    let foreign = send_text(&pool, chat_ac.id, alice, "private").await;

    // Bob claims chat_ab but lists a message that lives in chat_ac.
    let inserted = MessageRepo::mark_read(&pool, chat_ab.id, &[foreign.id], bob)
        .await
        .unwrap();
    assert_eq!(inserted, 0);

    let rows = MessageRepo::read_by_for(&pool, &[foreign.id]).await.unwrap();
    assert_eq!(rows, vec![(foreign.id, alice)], "Only the sender's receipt remains");
}
