//! The authoritative, in-memory rules engine for one Battleship match. Nothing in this module
//! performs I/O; callers (the game session handler, via [`super::registry::GameEngine`]) are
//! responsible for persisting nothing and broadcasting everything.

use std::collections::HashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Username;

pub const BOARD_SIZE: usize = 10;

/// Ship lengths and how many of each a player starts with. Total cells: 2 + 3 + 3 + 4 + 5 = 17.
const SHIP_LENGTHS: [(u8, u8); 4] = [(2, 1), (3, 2), (4, 1), (5, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Empty,
    Hit,
    Miss,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedShip {
    pub coords: Vec<(u8, u8)>,
    pub sunk: bool,
}

#[derive(Debug, Clone)]
struct ShipInventory(HashMap<u8, u8>);

impl ShipInventory {
    fn new() -> Self {
        Self(SHIP_LENGTHS.iter().cloned().collect())
    }

    fn remaining(&self, length: u8) -> u8 {
        *self.0.get(&length).unwrap_or(&0)
    }

    fn take(&mut self, length: u8) -> bool {
        match self.0.get_mut(&length) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn give_back(&mut self, length: u8) {
        *self.0.entry(length).or_insert(0) += 1;
    }

    fn all_placed(&self) -> bool {
        self.0.values().all(|&count| count == 0)
    }

    fn as_map(&self) -> HashMap<u8, u8> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Miss,
    Hit,
    Sunk,
    Win,
}

pub struct MoveOutcome {
    pub result: MoveResult,
    pub x: u8,
    pub y: u8,
    pub next_turn: Username,
}

/// Rule violations. Every variant maps to one of the exact uppercase messages the client is
/// expected to render as a private system chat line (see the error handling design).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    GameNotFound,
    NoneLeft(u8),
    NotAllShipsPlaced,
    NotYourTurn,
    NotBothReady,
    AlreadyShot,
    OutOfBounds,
    Overlap,
    NoShipAtPosition,
}

impl EngineError {
    pub fn message(&self) -> String {
        match self {
            Self::GameNotFound => "GAME NOT FOUND".to_owned(),
            Self::NoneLeft(length) => format!("NO MORE SHIPS OF LENGTH {} AVAILABLE", length),
            Self::NotAllShipsPlaced => "YOU MUST PLACE ALL SHIPS FIRST".to_owned(),
            Self::NotYourTurn => "NOT YOUR TURN".to_owned(),
            Self::NotBothReady => "BOTH PLAYERS MUST BE READY".to_owned(),
            Self::AlreadyShot => "ALREADY SHOT THIS POSITION - CHOOSE ANOTHER".to_owned(),
            Self::OutOfBounds => "SHIP OUT OF BOUNDS".to_owned(),
            Self::Overlap => "SHIP OVERLAPS ANOTHER SHIP".to_owned(),
            Self::NoShipAtPosition => "NO SHIP FOUND AT CHOSEN POSITION".to_owned(),
        }
    }
}

/// What the owner of `self_view` is allowed to know about the opponent's board: a hit/miss mask
/// from their own shots, with ship cells only revealed once the game has a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentCell {
    Unknown,
    Miss,
    Hit,
    Ship,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerGameView {
    pub players: (Username, Username),
    #[serde(rename = "self")]
    pub self_user: Username,
    pub own_board: Vec<Vec<bool>>,
    pub own_shots: Vec<Vec<Mark>>,
    pub incoming_shots: Vec<Vec<Mark>>,
    pub opponent_board: Vec<Vec<OpponentCell>>,
    pub placed_ships: Vec<PlacedShip>,
    /// Only ships the opponent has already lost are ever named; live ones stay hidden.
    pub opponent_sunk_ships: Vec<PlacedShip>,
    pub ships_left: HashMap<u8, u8>,
    pub opponent_ships_remaining: usize,
    pub ready: bool,
    pub opponent_ready: bool,
    pub turn: Username,
    pub winner: Option<Username>,
}

/// One authoritative Battleship match. Not thread-safe on its own: the registry serializes
/// access per `game_id` with a mutex, matching a single-threaded event loop's natural ordering.
pub struct Game {
    pub players: (Username, Username),
    boards: HashMap<Username, [[bool; BOARD_SIZE]; BOARD_SIZE]>,
    hits: HashMap<Username, [[Mark; BOARD_SIZE]; BOARD_SIZE]>,
    ships_left: HashMap<Username, ShipInventory>,
    placed_ships: HashMap<Username, Vec<PlacedShip>>,
    ready: HashMap<Username, bool>,
    pub turn: Username,
    pub winner: Option<Username>,
}

impl Game {
    pub fn new(p1: Username, p2: Username) -> Self {
        let turn = if rand::thread_rng().gen_bool(0.5) { p1.clone() } else { p2.clone() };
        let mut boards = HashMap::new();
        let mut hits = HashMap::new();
        let mut ships_left = HashMap::new();
        let mut placed_ships = HashMap::new();
        let mut ready = HashMap::new();
        for player in [&p1, &p2] {
            boards.insert(player.clone(), [[false; BOARD_SIZE]; BOARD_SIZE]);
            hits.insert(player.clone(), [[Mark::Empty; BOARD_SIZE]; BOARD_SIZE]);
            ships_left.insert(player.clone(), ShipInventory::new());
            placed_ships.insert(player.clone(), Vec::new());
            ready.insert(player.clone(), false);
        }
        Self { players: (p1, p2), boards, hits, ships_left, placed_ships, ready, turn, winner: None }
    }

    pub fn has_player(&self, user: &Username) -> bool {
        &self.players.0 == user || &self.players.1 == user
    }

    pub fn opponent_of<'a>(&'a self, user: &Username) -> &'a Username {
        if &self.players.0 == user { &self.players.1 } else { &self.players.0 }
    }

    fn ship_coords(x: u8, y: u8, length: u8, orientation: Orientation) -> Vec<(u8, u8)> {
        (0..length)
            .map(|i| match orientation {
                Orientation::Horizontal => (x + i, y),
                Orientation::Vertical => (x, y + i),
            })
            .collect()
    }

    /// Whether a ship of `length` starting at `(x, y)` stays on the board, computed in `usize`
    /// so a start coordinate near the `u8` edge can't overflow before this check runs.
    fn span_in_bounds(x: u8, y: u8, length: u8, orientation: Orientation) -> bool {
        let (x, y, length) = (x as usize, y as usize, length as usize);
        match orientation {
            Orientation::Horizontal => x + length <= BOARD_SIZE && y < BOARD_SIZE,
            Orientation::Vertical => x < BOARD_SIZE && y + length <= BOARD_SIZE,
        }
    }

    pub fn place_ship(
        &mut self,
        player: &Username,
        x: u8,
        y: u8,
        length: u8,
        orientation: Orientation,
    ) -> Result<(), EngineError> {
        let ships_left = self.ships_left.get_mut(player).ok_or(EngineError::GameNotFound)?;
        if ships_left.remaining(length) == 0 {
            return Err(EngineError::NoneLeft(length));
        }

        if !Self::span_in_bounds(x, y, length, orientation) {
            return Err(EngineError::OutOfBounds);
        }
        let coords = Self::ship_coords(x, y, length, orientation);

        let board = &self.boards[player];
        let overlaps = coords.iter().any(|&(cx, cy)| board[cy as usize][cx as usize]);
        if overlaps {
            return Err(EngineError::Overlap);
        }

        let board = self.boards.get_mut(player).unwrap();
        for &(cx, cy) in &coords {
            board[cy as usize][cx as usize] = true;
        }
        self.placed_ships.get_mut(player).unwrap().push(PlacedShip { coords, sunk: false });
        self.ships_left.get_mut(player).unwrap().take(length);
        Ok(())
    }

    pub fn remove_ship(&mut self, player: &Username, x: u8, y: u8) -> Result<(), EngineError> {
        let ships = self.placed_ships.get_mut(player).ok_or(EngineError::GameNotFound)?;
        let index = ships.iter().position(|ship| ship.coords.contains(&(x, y)))
            .ok_or(EngineError::NoShipAtPosition)?;
        let removed = ships.remove(index);

        let board = self.boards.get_mut(player).unwrap();
        for &(cx, cy) in &removed.coords {
            board[cy as usize][cx as usize] = false;
        }
        self.ships_left.get_mut(player).unwrap().give_back(removed.coords.len() as u8);
        Ok(())
    }

    pub fn set_ready(&mut self, player: &Username) -> Result<(), EngineError> {
        let ships_left = self.ships_left.get(player).ok_or(EngineError::GameNotFound)?;
        if !ships_left.all_placed() {
            return Err(EngineError::NotAllShipsPlaced);
        }
        *self.ready.get_mut(player).unwrap() = true;
        Ok(())
    }

    pub fn make_move(&mut self, player: &Username, x: u8, y: u8) -> Result<MoveOutcome, EngineError> {
        if !self.has_player(player) {
            return Err(EngineError::GameNotFound);
        }
        if self.winner.is_some() || self.turn != *player {
            return Err(EngineError::NotYourTurn);
        }
        if !self.ready[&self.players.0] || !self.ready[&self.players.1] {
            return Err(EngineError::NotBothReady);
        }
        if x as usize >= BOARD_SIZE || y as usize >= BOARD_SIZE {
            return Err(EngineError::OutOfBounds);
        }

        let enemy = self.opponent_of(player).clone();
        let hit_grid = self.hits.get_mut(player).unwrap();
        if hit_grid[y as usize][x as usize] != Mark::Empty {
            return Err(EngineError::AlreadyShot);
        }

        let enemy_board = self.boards[&enemy];
        let result = if enemy_board[y as usize][x as usize] {
            hit_grid[y as usize][x as usize] = Mark::Hit;

            let enemy_ships = self.placed_ships.get_mut(&enemy).unwrap();
            let hit_grid = &self.hits[player];
            let mut sunk_one = false;
            for ship in enemy_ships.iter_mut() {
                if ship.coords.contains(&(x, y)) {
                    if ship.coords.iter().all(|&(sx, sy)| hit_grid[sy as usize][sx as usize] == Mark::Hit) {
                        ship.sunk = true;
                        sunk_one = true;
                    }
                    break;
                }
            }

            if sunk_one && self.placed_ships[&enemy].iter().all(|ship| ship.sunk) {
                self.winner = Some(player.clone());
                MoveResult::Win
            } else if sunk_one {
                MoveResult::Sunk
            } else {
                MoveResult::Hit
            }
        } else {
            self.hits.get_mut(player).unwrap()[y as usize][x as usize] = Mark::Miss;
            MoveResult::Miss
        };

        self.turn = enemy.clone();

        Ok(MoveOutcome { result, x, y, next_turn: enemy })
    }

    pub fn state_for(&self, player: &Username) -> PlayerGameView {
        let enemy = self.opponent_of(player).clone();
        let own_board = self.boards[player];
        let enemy_board = self.boards[&enemy];
        let own_shots = self.hits[player];
        let incoming_shots = self.hits[&enemy];
        let revealed = self.winner.is_some();

        let opponent_board = (0..BOARD_SIZE)
            .map(|y| {
                (0..BOARD_SIZE)
                    .map(|x| match own_shots[y][x] {
                        Mark::Hit => OpponentCell::Hit,
                        Mark::Miss => OpponentCell::Miss,
                        Mark::Empty if revealed && enemy_board[y][x] => OpponentCell::Ship,
                        Mark::Empty => OpponentCell::Unknown,
                    })
                    .collect()
            })
            .collect();

        PlayerGameView {
            players: self.players.clone(),
            self_user: player.clone(),
            own_board: own_board.iter().map(|row| row.to_vec()).collect(),
            own_shots: own_shots.iter().map(|row| row.to_vec()).collect(),
            incoming_shots: incoming_shots.iter().map(|row| row.to_vec()).collect(),
            opponent_board,
            placed_ships: self.placed_ships[player].clone(),
            opponent_sunk_ships: self.placed_ships[&enemy].iter().filter(|s| s.sunk).cloned().collect(),
            ships_left: self.ships_left[player].as_map(),
            opponent_ships_remaining: self.placed_ships[&enemy].iter().filter(|s| !s.sunk).count(),
            ready: self.ready[player],
            opponent_ready: self.ready[&enemy],
            turn: self.turn.clone(),
            winner: self.winner.clone(),
        }
    }

    /// Invariant 1 helper: total cells covered by placed ships plus cells still in inventory.
    #[cfg(test)]
    fn total_ship_cells(&self, player: &Username) -> u32 {
        let placed: u32 = self.placed_ships[player].iter().map(|s| s.coords.len() as u32).sum();
        let left: u32 = SHIP_LENGTHS.iter()
            .map(|&(length, _)| length as u32 * self.ships_left[player].remaining(length) as u32)
            .sum();
        placed + left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> (Username, Username) {
        (Username::from("alice"), Username::from("bob"))
    }

    fn place_all(game: &mut Game, player: &Username, row_offset: u8) {
        // 2,3,3,4,5 laid out on separate rows so nothing overlaps.
        let lengths = [2u8, 3, 3, 4, 5];
        for (row, &length) in lengths.iter().enumerate() {
            game.place_ship(player, 0, row_offset + row as u8, length, Orientation::Horizontal).unwrap();
        }
    }

    #[test]
    fn placement_keeps_total_cells_invariant() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob.clone());
        place_all(&mut game, &alice, 0);
        assert_eq!(game.total_ship_cells(&alice), 17);
        assert!(game.ships_left[&alice].all_placed());
    }

    #[test]
    fn out_of_bounds_placement_is_rejected() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob);
        let err = game.place_ship(&alice, 8, 0, 5, Orientation::Horizontal).unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds);
    }

    #[test]
    fn placement_near_u8_edge_is_rejected_without_overflow() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob);
        let err = game.place_ship(&alice, 254, 0, 5, Orientation::Horizontal).unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds);
        let err = game.place_ship(&alice, 0, 254, 5, Orientation::Vertical).unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds);
    }

    #[test]
    fn overlapping_placement_is_rejected() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob);
        game.place_ship(&alice, 0, 0, 4, Orientation::Horizontal).unwrap();
        let err = game.place_ship(&alice, 2, 0, 2, Orientation::Horizontal).unwrap_err();
        assert_eq!(err, EngineError::Overlap);
    }

    #[test]
    fn set_ready_requires_full_fleet() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob);
        assert_eq!(game.set_ready(&alice).unwrap_err(), EngineError::NotAllShipsPlaced);
        place_all(&mut game, &alice, 0);
        game.set_ready(&alice).unwrap();
    }

    #[test]
    fn full_game_miss_hit_sink_and_win() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob.clone());
        place_all(&mut game, &alice, 0);
        place_all(&mut game, &bob, 0);
        game.set_ready(&alice).unwrap();
        game.set_ready(&bob).unwrap();
        game.turn = alice.clone();

        // bob's 2-length ship sits at row 0, columns 0-1.
        let miss = game.make_move(&alice, 5, 5).unwrap();
        assert_eq!(miss.result, MoveResult::Miss);
        assert_eq!(game.turn, bob);

        let err = game.make_move(&alice, 5, 5).unwrap_err();
        assert_eq!(err, EngineError::NotYourTurn);

        game.make_move(&bob, 9, 9).unwrap();
        assert_eq!(game.turn, alice);

        let hit = game.make_move(&alice, 0, 0).unwrap();
        assert_eq!(hit.result, MoveResult::Hit);
        game.make_move(&bob, 9, 8).unwrap();
        let sunk = game.make_move(&alice, 1, 0).unwrap();
        assert_eq!(sunk.result, MoveResult::Sunk);
        assert!(game.placed_ships[&bob][0].sunk);
    }

    #[test]
    fn make_move_off_board_is_rejected_without_indexing() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob.clone());
        place_all(&mut game, &alice, 0);
        place_all(&mut game, &bob, 0);
        game.set_ready(&alice).unwrap();
        game.set_ready(&bob).unwrap();
        game.turn = alice.clone();

        let err = game.make_move(&alice, 10, 0).unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds);
        let err = game.make_move(&alice, 0, 255).unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds);
        // Turn must not have advanced after a rejected move.
        assert_eq!(game.turn, alice);
    }

    #[test]
    fn winning_sinks_last_ship_and_freezes_turn() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob.clone());
        // Bob gets a single 2-length ship and nothing else, to reach a win quickly.
        game.place_ship(&bob, 3, 3, 2, Orientation::Horizontal).unwrap();
        *game.ships_left.get_mut(&bob).unwrap() = ShipInventory(HashMap::new());
        *game.ships_left.get_mut(&alice).unwrap() = ShipInventory(HashMap::new());
        game.set_ready(&alice).unwrap();
        game.set_ready(&bob).unwrap();
        game.turn = alice.clone();

        game.make_move(&alice, 3, 3).unwrap();
        game.make_move(&bob, 0, 0).unwrap();
        let win = game.make_move(&alice, 4, 3).unwrap();
        assert_eq!(win.result, MoveResult::Win);
        assert_eq!(game.winner, Some(alice.clone()));

        let err = game.make_move(&bob, 1, 1).unwrap_err();
        assert_eq!(err, EngineError::NotYourTurn);
    }

    #[test]
    fn opponent_board_hides_unhit_ships_until_victory() {
        let (alice, bob) = players();
        let mut game = Game::new(alice.clone(), bob.clone());
        game.place_ship(&bob, 3, 3, 2, Orientation::Horizontal).unwrap();
        let view = game.state_for(&alice);
        assert_eq!(view.opponent_board[3][3], OpponentCell::Unknown);

        game.winner = Some(alice.clone());
        let view = game.state_for(&alice);
        assert_eq!(view.opponent_board[3][3], OpponentCell::Ship);
    }
}
