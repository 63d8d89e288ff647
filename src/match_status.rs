//! Match Service: per-player status for a game, stored as JSON-encoded hash fields keyed by
//! `game_id`. Created lazily on first game-session connect, cleared whenever the game under
//! that id is (re)created.

use serde::{Deserialize, Serialize};

use crate::game::{GameId, Username};
use crate::store::InMemoryStore;

/// The `(temp_disconnect, full_disconnect)` pair collapsed into the two-bit state machine the
/// design calls for: `Connected -> Temporary -> Full` is the only forward path, and
/// `Temporary -> Connected` is a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Temporary,
    Full,
}

impl ConnectionState {
    pub fn is_disconnected(self) -> bool {
        self != Self::Connected
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerStatus {
    #[serde(default)]
    pub connection: ConnectionState,
    #[serde(default)]
    pub restart: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Connected
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self { connection: ConnectionState::Connected, restart: false }
    }
}

fn hash_key(game_id: &GameId) -> String {
    game_id.to_string()
}

pub fn get(store: &InMemoryStore, game_id: &GameId, player: &Username) -> PlayerStatus {
    store.hash_get(&hash_key(game_id), player.as_str()).unwrap_or(None)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

fn put(store: &InMemoryStore, game_id: &GameId, player: &Username, status: PlayerStatus) {
    let raw = serde_json::to_string(&status).expect("PlayerStatus always serializes");
    store.hash_set(&hash_key(game_id), player.as_str(), &raw).ok();
}

pub fn set_connection(store: &InMemoryStore, game_id: &GameId, player: &Username, connection: ConnectionState) {
    let mut status = get(store, game_id, player);
    status.connection = connection;
    put(store, game_id, player, status);
}

pub fn set_restart(store: &InMemoryStore, game_id: &GameId, player: &Username, restart: bool) {
    let mut status = get(store, game_id, player);
    status.restart = restart;
    put(store, game_id, player, status);
}

pub fn both_restarting(store: &InMemoryStore, game_id: &GameId, p1: &Username, p2: &Username) -> bool {
    get(store, game_id, p1).restart && get(store, game_id, p2).restart
}

pub fn both_fully_disconnected(store: &InMemoryStore, game_id: &GameId, p1: &Username, p2: &Username) -> bool {
    get(store, game_id, p1).connection == ConnectionState::Full
        && get(store, game_id, p2).connection == ConnectionState::Full
}

/// Wipes the whole per-match hash. Must be called whenever `GameEngine::create_game` (re)creates
/// a match under this id, so stale restart/disconnect flags from a previous round can't instantly
/// retrigger a rematch or a bogus "has left" message.
pub fn clear(store: &InMemoryStore, game_id: &GameId) {
    store.delete(&hash_key(game_id)).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_connected_and_not_restarting() {
        let store = InMemoryStore::new();
        let game_id = GameId("game-alice-bob".to_owned());
        let status = get(&store, &game_id, &Username::from("alice"));
        assert_eq!(status.connection, ConnectionState::Connected);
        assert!(!status.restart);
    }

    #[test]
    fn restart_requires_both_players() {
        let store = InMemoryStore::new();
        let game_id = GameId("game-alice-bob".to_owned());
        let alice = Username::from("alice");
        let bob = Username::from("bob");

        set_restart(&store, &game_id, &alice, true);
        assert!(!both_restarting(&store, &game_id, &alice, &bob));

        set_restart(&store, &game_id, &bob, true);
        assert!(both_restarting(&store, &game_id, &alice, &bob));
    }

    #[test]
    fn clear_resets_stale_restart_flags() {
        let store = InMemoryStore::new();
        let game_id = GameId("game-alice-bob".to_owned());
        let alice = Username::from("alice");
        set_restart(&store, &game_id, &alice, true);
        clear(&store, &game_id);
        assert!(!get(&store, &game_id, &alice).restart);
    }
}
