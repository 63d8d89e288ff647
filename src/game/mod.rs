pub mod engine;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated player identity. The core never creates or validates these; it is handed
/// one by the surrounding application at session-open time (see [`crate::lib::auth`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self { Self(value) }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl Username {
    pub fn as_str(&self) -> &str { &self.0 }
}

/// Canonical identifier of a match, always derived from the unordered pair of its players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl GameId {
    /// Orders the pair and derives `game_id = "game-" + sorted(players).join("-")`, so that
    /// the id is a deterministic function of the unordered pair (invariant 4).
    pub fn for_players(a: &Username, b: &Username) -> (Username, Username, GameId) {
        let (p1, p2) = if a <= b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        let id = GameId(format!("game-{}-{}", p1.0, p2.0));
        (p1, p2, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_id_is_order_independent() {
        let alice = Username::from("alice");
        let bob = Username::from("bob");

        let (_, _, id_a) = GameId::for_players(&alice, &bob);
        let (_, _, id_b) = GameId::for_players(&bob, &alice);

        assert_eq!(id_a, id_b);
        assert_eq!(id_a.0, "game-alice-bob");
    }
}
