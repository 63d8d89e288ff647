//! The Channel Layer: named-group pub/sub fan-out, generalized from Kalaxia's `LobbyWebsocket`
//! broadcast actor so any number of independently-named groups can exist at once instead of one
//! hardcoded lobby room.
//!
//! Unlike the source this is grounded on, delivery is a typed enum rather than a dynamically
//! dispatched `{type, ...}` JSON blob: a group's event type `E` is fixed at the call site, and
//! the session's `Handler<E>` impl is the "match on type" the design notes ask for.

use std::collections::HashMap;
use std::sync::Mutex;

use actix::{Actor, Handler, Message, Recipient};
use uuid::Uuid;

/// One named multicast destination. `E` is the event payload delivered to every subscriber; each
/// session kind (lobby, game) gets its own hub instantiated over its own event enum.
pub struct ChannelHub<E: Message + Send + Clone + 'static>
where
    E::Result: Send,
{
    groups: Mutex<HashMap<String, HashMap<Uuid, Recipient<E>>>>,
}

impl<E: Message + Send + Clone + 'static> ChannelHub<E>
where
    E::Result: Send,
{
    pub fn new() -> Self {
        Self { groups: Mutex::new(HashMap::new()) }
    }

    pub fn group_add(&self, group: &str, session: Uuid, recipient: Recipient<E>) {
        self.groups.lock().unwrap()
            .entry(group.to_owned())
            .or_default()
            .insert(session, recipient);
    }

    pub fn group_discard(&self, group: &str, session: &Uuid) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(members) = groups.get_mut(group) {
            members.remove(session);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// Removes a session from every group it might belong to. Used on full session teardown so
    /// callers don't need to remember every group a session ever joined.
    pub fn discard_everywhere(&self, session: &Uuid) {
        let mut groups = self.groups.lock().unwrap();
        groups.retain(|_, members| {
            members.remove(session);
            !members.is_empty()
        });
    }

    pub fn group_send(&self, group: &str, event: E) {
        let recipients: Vec<Recipient<E>> = match self.groups.lock().unwrap().get(group) {
            Some(members) => members.values().cloned().collect(),
            None => return,
        };
        for recipient in recipients {
            let _ = recipient.do_send(event.clone());
        }
    }

    pub fn group_members(&self, group: &str) -> usize {
        self.groups.lock().unwrap().get(group).map_or(0, |m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::prelude::*;

    #[derive(Message, Clone)]
    #[rtype(result = "()")]
    struct Ping(u32);

    struct Catcher {
        seen: std::sync::Arc<Mutex<Vec<u32>>>,
    }

    impl Actor for Catcher {
        type Context = Context<Self>;
    }

    impl Handler<Ping> for Catcher {
        type Result = ();
        fn handle(&mut self, msg: Ping, _ctx: &mut Self::Context) {
            self.seen.lock().unwrap().push(msg.0);
        }
    }

    #[actix_rt::test]
    async fn group_send_reaches_every_member_but_not_after_discard() {
        let hub: ChannelHub<Ping> = ChannelHub::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let addr = Catcher { seen: seen.clone() }.start();
        let id = Uuid::new_v4();

        hub.group_add("lobby_users", id, addr.clone().recipient());
        hub.group_send("lobby_users", Ping(1));
        actix_rt::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        hub.group_discard("lobby_users", &id);
        hub.group_send("lobby_users", Ping(2));
        actix_rt::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
