//! Presence & Lobby roster bookkeeping on top of the keyed store.

use std::time::Duration;

use crate::game::Username;
use crate::store::{InMemoryStore, StoreResult};

pub const PRESENCE_TTL: Duration = Duration::from_secs(30);

fn presence_key(user: &Username) -> String {
    format!("online_{}", user)
}

pub fn mark_online(store: &InMemoryStore, user: &Username) -> StoreResult<()> {
    store.set_with_ttl(&presence_key(user), PRESENCE_TTL)
}

pub fn is_online(store: &InMemoryStore, user: &Username) -> bool {
    store.exists(&presence_key(user)).unwrap_or(false)
}

pub fn join_lobby(store: &InMemoryStore, user: &Username) -> StoreResult<()> {
    store.add_to_set("lobby_users", user.as_str(), None)
}

pub fn leave_lobby(store: &InMemoryStore, user: &Username) -> StoreResult<()> {
    store.remove_from_set("lobby_users", user.as_str())
}

pub fn lobby_roster(store: &InMemoryStore) -> Vec<Username> {
    store.members("lobby_users").unwrap_or_default().into_iter().map(Username::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn presence_ttl_expires_after_thirty_seconds() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        mark_online(&store, &alice).unwrap();
        assert!(is_online(&store, &alice));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!is_online(&store, &alice));
    }

    #[test]
    fn lobby_roster_reflects_join_and_leave() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        join_lobby(&store, &alice).unwrap();
        assert_eq!(lobby_roster(&store), vec![alice.clone()]);
        leave_lobby(&store, &alice).unwrap();
        assert!(lobby_roster(&store).is_empty());
    }
}
