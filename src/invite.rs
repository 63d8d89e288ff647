//! Invite Service: directed, time-limited invitations represented symmetrically as two TTL'd
//! sets so either side expiring independently still heals into a consistent "gone" state.

use std::time::Duration;

use crate::game::Username;
use crate::store::InMemoryStore;

pub const INVITE_TTL: Duration = Duration::from_secs(60);
pub const WATCHER_INITIAL_SLEEP: Duration = Duration::from_secs(60);
pub const WATCHER_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn incoming_key(user: &Username) -> String {
    format!("invites_incoming:{}", user)
}

fn outgoing_key(user: &Username) -> String {
    format!("invites_outgoing:{}", user)
}

#[derive(Debug, Clone, Default)]
pub struct InviteState {
    pub incoming: Vec<Username>,
    pub outgoing: Vec<Username>,
}

pub fn add_invite(store: &InMemoryStore, from: &Username, to: &Username) {
    store.add_to_set(&outgoing_key(from), to.as_str(), Some(INVITE_TTL)).ok();
    store.add_to_set(&incoming_key(to), from.as_str(), Some(INVITE_TTL)).ok();
}

pub fn remove_invite(store: &InMemoryStore, from: &Username, to: &Username) {
    store.remove_from_set(&outgoing_key(from), to.as_str()).ok();
    store.remove_from_set(&incoming_key(to), from.as_str()).ok();
}

pub fn state(store: &InMemoryStore, user: &Username) -> InviteState {
    InviteState {
        incoming: store.members(&incoming_key(user)).unwrap_or_default().into_iter().map(Username::from).collect(),
        outgoing: store.members(&outgoing_key(user)).unwrap_or_default().into_iter().map(Username::from).collect(),
    }
}

/// True once neither side of the `(from, to)` pair still holds its half of the invite, i.e. both
/// TTLs have lapsed (or it was explicitly removed).
pub fn is_expired(store: &InMemoryStore, from: &Username, to: &Username) -> bool {
    let outgoing_gone = !store.members(&outgoing_key(from)).unwrap_or_default().iter().any(|v| v == to.as_str());
    let incoming_gone = !store.members(&incoming_key(to)).unwrap_or_default().iter().any(|v| v == from.as_str());
    outgoing_gone && incoming_gone
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_invite_is_symmetric() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        add_invite(&store, &alice, &bob);

        assert_eq!(state(&store, &bob).incoming, vec![alice.clone()]);
        assert_eq!(state(&store, &alice).outgoing, vec![bob.clone()]);
        assert!(!is_expired(&store, &alice, &bob));
    }

    #[test]
    fn remove_invite_clears_both_sides() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        add_invite(&store, &alice, &bob);
        remove_invite(&store, &alice, &bob);

        assert!(state(&store, &bob).incoming.is_empty());
        assert!(state(&store, &alice).outgoing.is_empty());
        assert!(is_expired(&store, &alice, &bob));
    }

    #[tokio::test(start_paused = true)]
    async fn invite_expires_after_ttl() {
        let store = InMemoryStore::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        add_invite(&store, &alice, &bob);

        tokio::time::advance(INVITE_TTL + Duration::from_secs(1)).await;
        assert!(is_expired(&store, &alice, &bob));
    }
}
