//! Chat Service: ordered message lists for the two chat flavors (per-game, lobby 1:1), plus the
//! lazy lobby-chat cleanup sweep described alongside the lobby session handler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::{GameId, Username};
use crate::presence;
use crate::store::InMemoryStore;

pub const CLEANUP_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMsgType {
    System,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAccess {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameChatEntry {
    pub from: Username,
    pub msg_type: ChatMsgType,
    pub msg: String,
    pub access: ChatAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyChatEntry {
    pub from: Username,
    pub msg: String,
}

fn game_chat_key(game_id: &GameId) -> String {
    format!("gamechat:{}", game_id)
}

pub fn push_game_message(store: &InMemoryStore, game_id: &GameId, entry: GameChatEntry) {
    let raw = serde_json::to_string(&entry).expect("GameChatEntry always serializes");
    store.list_push(&game_chat_key(game_id), &raw).ok();
}

pub fn game_history(store: &InMemoryStore, game_id: &GameId) -> Vec<GameChatEntry> {
    store.list_range(&game_chat_key(game_id)).unwrap_or_default().iter()
        .filter_map(|raw| serde_json::from_str(raw).ok())
        .collect()
}

pub fn delete_game_history(store: &InMemoryStore, game_id: &GameId) {
    store.delete(&game_chat_key(game_id)).ok();
}

/// `u1<u2` lexicographically, matching the lobby 1:1 chat id convention.
pub fn lobby_chat_id(a: &Username, b: &Username) -> String {
    if a <= b { format!("{}_{}", a, b) } else { format!("{}_{}", b, a) }
}

fn lobby_chats_key(user: &Username) -> String {
    format!("lobby_chats:{}", user)
}

pub fn push_lobby_message(store: &InMemoryStore, a: &Username, b: &Username, entry: LobbyChatEntry) {
    let chat_id = lobby_chat_id(a, b);
    store.add_to_set(&lobby_chats_key(a), &chat_id, None).ok();
    store.add_to_set(&lobby_chats_key(b), &chat_id, None).ok();
    let raw = serde_json::to_string(&entry).expect("LobbyChatEntry always serializes");
    store.list_push(&chat_id, &raw).ok();
}

/// Joining a chat without sending anything also needs to be indexed, so a later cleanup sweep
/// for the joiner's own `lobby_chats` set considers this chat.
pub fn index_lobby_chat(store: &InMemoryStore, user: &Username, chat_id: &str) {
    store.add_to_set(&lobby_chats_key(user), chat_id, None).ok();
}

pub fn lobby_history(store: &InMemoryStore, chat_id: &str) -> Vec<LobbyChatEntry> {
    store.list_range(chat_id).unwrap_or_default().iter()
        .filter_map(|raw| serde_json::from_str(raw).ok())
        .collect()
}

fn split_chat_id(chat_id: &str) -> Option<(Username, Username)> {
    let mut parts = chat_id.splitn(2, '_');
    let a = parts.next()?;
    let b = parts.next()?;
    Some((Username::from(a), Username::from(b)))
}

/// Runs 30s after a lobby disconnect or a game full-disconnect: prunes any 1:1 chat of `user`'s
/// where every other participant has gone offline in the meantime.
pub async fn cleanup_lobby_chats(store: &InMemoryStore, user: Username) {
    tokio::time::sleep(CLEANUP_DELAY).await;

    let chat_ids = store.members(&lobby_chats_key(&user)).unwrap_or_default();
    for chat_id in chat_ids {
        let Some((a, b)) = split_chat_id(&chat_id) else { continue };
        let other = if a == user { b } else { a };
        if presence::is_online(store, &other) {
            continue;
        }

        store.delete(&chat_id).ok();
        for participant in [&user, &other] {
            store.remove_from_set(&lobby_chats_key(participant), &chat_id).ok();
            if store.members(&lobby_chats_key(participant)).unwrap_or_default().is_empty() {
                store.delete(&lobby_chats_key(participant)).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_chat_id_is_order_independent() {
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        assert_eq!(lobby_chat_id(&alice, &bob), "alice_bob");
        assert_eq!(lobby_chat_id(&bob, &alice), "alice_bob");
    }

    #[test]
    fn game_history_preserves_append_order() {
        let store = InMemoryStore::new();
        let game_id = GameId("game-alice-bob".to_owned());
        push_game_message(&store, &game_id, GameChatEntry {
            from: Username::from("alice"), msg_type: ChatMsgType::User, msg: "hi".into(), access: ChatAccess::Public,
        });
        push_game_message(&store, &game_id, GameChatEntry {
            from: Username::from("bob"), msg_type: ChatMsgType::System, msg: "BOB IS READY".into(), access: ChatAccess::Public,
        });
        let history = game_history(&store, &game_id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from, Username::from("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_removes_chat_only_once_other_participant_is_offline() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        // Longer than the cleanup delay, so bob is still online at the first sweep.
        store.set_with_ttl(&format!("online_{}", bob), Duration::from_secs(40)).unwrap();
        push_lobby_message(&store, &alice, &bob, LobbyChatEntry { from: alice.clone(), msg: "hi".into() });

        cleanup_lobby_chats(&store, alice.clone()).await;
        assert!(!lobby_history(&store, &lobby_chat_id(&alice, &bob)).is_empty());

        // Bob's presence has since lapsed; a second sweep should prune the chat.
        tokio::time::advance(Duration::from_secs(15)).await;
        cleanup_lobby_chats(&store, alice.clone()).await;
        assert!(lobby_history(&store, &lobby_chat_id(&alice, &bob)).is_empty());
    }
}
