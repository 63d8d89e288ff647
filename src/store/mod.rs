//! The ephemeral Keyed Store: a single-process stand-in for the broker-backed cache the original
//! deployment leans on for presence, invites, chat history and match status. Every value is
//! wall-clock TTL'd and expiry is never refreshed by a read, matching the design note that TTLs
//! are a cache property, not a session-activity property.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::lib::error::InternalError;

pub type StoreResult<T> = Result<T, InternalError>;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn fresh(value: T, ttl: Option<Duration>) -> Self {
        Self { value, expires_at: ttl.map(|ttl| Instant::now() + ttl) }
    }

    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// In-process implementation of the keyed store operations from the component design. A single
/// coarse mutex is fine here: every operation is O(1) or O(members), and nothing awaits while
/// holding it.
#[derive(Default)]
pub struct InMemoryStore {
    strings: Mutex<HashMap<String, Entry<()>>>,
    sets: Mutex<HashMap<String, Entry<Vec<String>>>>,
    lists: Mutex<HashMap<String, Vec<String>>>,
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        self.strings.lock().unwrap().insert(key.to_owned(), Entry::fresh((), Some(ttl)));
        Ok(())
    }

    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut strings = self.strings.lock().unwrap();
        Ok(match strings.get(key) {
            Some(entry) if entry.is_live() => true,
            Some(_) => { strings.remove(key); false }
            None => false,
        })
    }

    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.strings.lock().unwrap().remove(key);
        self.sets.lock().unwrap().remove(key);
        self.lists.lock().unwrap().remove(key);
        self.hashes.lock().unwrap().remove(key);
        Ok(())
    }

    pub fn add_to_set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut sets = self.sets.lock().unwrap();
        let entry = sets.entry(key.to_owned()).or_insert_with(|| Entry::fresh(Vec::new(), ttl));
        if !entry.is_live() {
            entry.value.clear();
        }
        if !entry.value.iter().any(|v| v == value) {
            entry.value.push(value.to_owned());
        }
        if ttl.is_some() {
            entry.expires_at = ttl.map(|ttl| Instant::now() + ttl);
        }
        Ok(())
    }

    pub fn remove_from_set(&self, key: &str, value: &str) -> StoreResult<()> {
        if let Some(entry) = self.sets.lock().unwrap().get_mut(key) {
            entry.value.retain(|v| v != value);
        }
        Ok(())
    }

    pub fn members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut sets = self.sets.lock().unwrap();
        Ok(match sets.get(key) {
            Some(entry) if entry.is_live() => entry.value.clone(),
            Some(_) => { sets.remove(key); Vec::new() }
            None => Vec::new(),
        })
    }

    pub fn list_push(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lists.lock().unwrap().entry(key.to_owned()).or_default().push(value.to_owned());
        Ok(())
    }

    pub fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.lists.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    pub fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.hashes.lock().unwrap().entry(key.to_owned()).or_default().insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self.hashes.lock().unwrap().get(key).and_then(|h| h.get(field).cloned()))
    }

    pub fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self.hashes.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    pub fn hash_del(&self, key: &str, field: &str) -> StoreResult<()> {
        if let Some(hash) = self.hashes.lock().unwrap().get_mut(key) {
            hash.remove(field);
        }
        Ok(())
    }

    /// Drops every expired string and set entry. Run periodically from a background task so
    /// dead presence/invite keys don't accumulate forever between reads.
    pub fn reap_expired(&self) {
        self.strings.lock().unwrap().retain(|_, entry| entry.is_live());
        self.sets.lock().unwrap().retain(|_, entry| entry.is_live());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn string_ttl_expires() {
        let store = InMemoryStore::new();
        store.set_with_ttl("online_alice", Duration::from_secs(30)).unwrap();
        assert!(store.exists("online_alice").unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.exists("online_alice").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn set_members_survive_until_ttl_then_vanish() {
        let store = InMemoryStore::new();
        store.add_to_set("invites_incoming:bob", "alice", Some(Duration::from_secs(60))).unwrap();
        assert_eq!(store.members("invites_incoming:bob").unwrap(), vec!["alice".to_owned()]);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.members("invites_incoming:bob").unwrap().is_empty());
    }

    #[test]
    fn hash_set_get_and_delete_roundtrip() {
        let store = InMemoryStore::new();
        store.hash_set("game-alice-bob", "alice", "{}").unwrap();
        assert_eq!(store.hash_get("game-alice-bob", "alice").unwrap(), Some("{}".to_owned()));
        store.hash_del("game-alice-bob", "alice").unwrap();
        assert_eq!(store.hash_get("game-alice-bob", "alice").unwrap(), None);
    }

    #[test]
    fn list_push_and_range_preserve_order() {
        let store = InMemoryStore::new();
        store.list_push("gamechat:game-alice-bob", "one").unwrap();
        store.list_push("gamechat:game-alice-bob", "two").unwrap();
        assert_eq!(store.list_range("gamechat:game-alice-bob").unwrap(), vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn remove_from_set_is_idempotent() {
        let store = InMemoryStore::new();
        store.add_to_set("lobby_users", "alice", None).unwrap();
        store.remove_from_set("lobby_users", "alice").unwrap();
        store.remove_from_set("lobby_users", "alice").unwrap();
        assert!(store.members("lobby_users").unwrap().is_empty());
    }
}
