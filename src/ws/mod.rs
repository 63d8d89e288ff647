pub mod game;
pub mod lobby;
pub mod protocol;
