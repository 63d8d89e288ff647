//! Owns every live [`Game`] behind its own mutex, and exposes the same operation surface the
//! game session handler calls into. Grounded on the locking granularity used by Kalaxia's
//! `GameServer` actor-per-game design, but collapsed to one mutex per match instead of one actor
//! per match: there is no per-game background work here, so an actor would only add mailbox
//! overhead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::engine::{EngineError, Game, MoveOutcome, Orientation, PlayerGameView};
use super::{GameId, Username};

type SharedGame = Arc<Mutex<Game>>;

/// The "Game Engine" component: a registry of matches, each independently lockable.
pub struct GameEngine {
    games: Mutex<HashMap<GameId, SharedGame>>,
}

impl GameEngine {
    pub fn new() -> Self {
        Self { games: Mutex::new(HashMap::new()) }
    }

    /// Starts a brand new match for this player pair, replacing any previous one under the same
    /// id. Callers that rematch must also clear per-match status hash state (ready/restart
    /// flags) themselves; this only resets engine state.
    pub fn create_game(&self, p1: Username, p2: Username) -> GameId {
        let (p1, p2, id) = GameId::for_players(&p1, &p2);
        let game = Arc::new(Mutex::new(Game::new(p1, p2)));
        self.games.lock().unwrap().insert(id.clone(), game);
        id
    }

    fn lookup(&self, id: &GameId) -> Result<SharedGame, EngineError> {
        self.games.lock().unwrap().get(id).cloned().ok_or(EngineError::GameNotFound)
    }

    pub fn get_game_state(&self, id: &GameId, player: &Username) -> Result<PlayerGameView, EngineError> {
        let game = self.lookup(id)?;
        let game = game.lock().unwrap();
        if !game.has_player(player) {
            return Err(EngineError::GameNotFound);
        }
        Ok(game.state_for(player))
    }

    pub fn place_ship(
        &self,
        id: &GameId,
        player: &Username,
        x: u8,
        y: u8,
        length: u8,
        orientation: Orientation,
    ) -> Result<(), EngineError> {
        let game = self.lookup(id)?;
        game.lock().unwrap().place_ship(player, x, y, length, orientation)
    }

    pub fn remove_ship(&self, id: &GameId, player: &Username, x: u8, y: u8) -> Result<(), EngineError> {
        let game = self.lookup(id)?;
        game.lock().unwrap().remove_ship(player, x, y)
    }

    pub fn set_ready(&self, id: &GameId, player: &Username) -> Result<(), EngineError> {
        let game = self.lookup(id)?;
        game.lock().unwrap().set_ready(player)
    }

    pub fn make_move(&self, id: &GameId, player: &Username, x: u8, y: u8) -> Result<MoveOutcome, EngineError> {
        let game = self.lookup(id)?;
        game.lock().unwrap().make_move(player, x, y)
    }

    /// Linear scan over live matches for the one this player currently belongs to. Mirrors the
    /// original lobby's `find_game_id` helper; fine at this scale since a player is in at most
    /// one match and the registry is not expected to hold more than a few thousand entries.
    pub fn find_for_user(&self, user: &Username) -> Option<GameId> {
        self.games.lock().unwrap().iter()
            .find(|(_, game)| game.lock().unwrap().has_player(user))
            .map(|(id, _)| id.clone())
    }

    pub fn end_game(&self, id: &GameId) {
        self.games.lock().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rematch_reuses_the_same_game_id() {
        let engine = GameEngine::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");

        let first = engine.create_game(alice.clone(), bob.clone());
        engine.place_ship(&first, &alice, 0, 0, 2, Orientation::Horizontal).unwrap();

        let second = engine.create_game(bob.clone(), alice.clone());
        assert_eq!(first, second);

        // Restarting must produce a clean board, not the stale placement from the first game.
        let state = engine.get_game_state(&second, &alice).unwrap();
        assert!(state.placed_ships.is_empty());
    }

    #[test]
    fn find_for_user_locates_the_active_match() {
        let engine = GameEngine::new();
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        let carol = Username::from("carol");

        let id = engine.create_game(alice.clone(), bob.clone());
        assert_eq!(engine.find_for_user(&alice), Some(id));
        assert_eq!(engine.find_for_user(&carol), None);
    }

    #[test]
    fn unknown_game_id_surfaces_game_not_found() {
        let engine = GameEngine::new();
        let ghost = GameId("game-nope-nope".to_owned());
        let err = engine.get_game_state(&ghost, &Username::from("alice")).unwrap_err();
        assert_eq!(err, EngineError::GameNotFound);
    }
}
