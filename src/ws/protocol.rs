//! Wire protocol and internal event types for both session kinds.
//!
//! Two tiers, deliberately kept apart:
//! - `*Action` / `*Outbound`: the JSON actually exchanged with a client, tagged the way the
//!   external interface requires (`action` on the way in, `type` on the way out).
//! - `*GroupEvent`: what actually travels through the channel layer between sessions. These are
//!   a plain Rust enum matched in each session's `Handler` impl, in place of a dotted
//!   `event.type` string dispatch (`send.chat.history` -> `send_chat_history`).

use actix::Message;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatAccess, GameChatEntry, LobbyChatEntry};
use crate::game::engine::{Orientation, PlayerGameView};
use crate::game::{GameId, Username};
use crate::invite::InviteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteResponseStatus {
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum LobbyAction {
    #[serde(rename = "invite")]
    Invite { to: Username },
    #[serde(rename = "invite_response")]
    InviteResponse { from: Username, status: InviteResponseStatus },
    #[serde(rename = "invite_cancel")]
    InviteCancel { to: Username },
    #[serde(rename = "send_msg")]
    SendMsg {
        #[serde(rename = "chatWith")]
        chat_with: Username,
        msg: String,
    },
    #[serde(rename = "join_chat")]
    JoinChat {
        #[serde(rename = "chatWith")]
        chat_with: Username,
    },
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LobbyOutbound {
    #[serde(rename = "user_list")]
    UserList {
        users: Vec<Username>,
        #[serde(rename = "self")]
        self_user: Username,
    },
    #[serde(rename = "invite_state")]
    InviteState { incoming: Vec<Username>, outgoing: Vec<Username> },
    #[serde(rename = "invite_accepted")]
    InviteAccepted { from: Username },
    #[serde(rename = "invite_declined")]
    InviteDeclined { from: Username },
    #[serde(rename = "chat_notify")]
    ChatNotify { from: Username },
    #[serde(rename = "chat_history")]
    ChatHistory { history: Vec<LobbyChatEntry> },
    #[serde(rename = "in_game")]
    InGame { game_id: GameId },
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<InviteState> for LobbyOutbound {
    fn from(state: InviteState) -> Self {
        Self::InviteState { incoming: state.incoming, outgoing: state.outgoing }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum GameAction {
    #[serde(rename = "place_ship")]
    PlaceShip { x: u8, y: u8, length: u8, orientation: Orientation },
    #[serde(rename = "remove_ship")]
    RemoveShip { x: u8, y: u8 },
    #[serde(rename = "set_ready")]
    SetReady,
    #[serde(rename = "make_move")]
    MakeMove { x: u8, y: u8 },
    #[serde(rename = "restart_game")]
    RestartGame,
    #[serde(rename = "send_msg")]
    SendMsg { sender: Username, msg: String, access: ChatAccess },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "leave_game")]
    LeaveGame,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum GameOutbound {
    #[serde(rename = "game_state")]
    GameState {
        state: PlayerGameView,
        players_disconnect: std::collections::HashMap<Username, bool>,
    },
    #[serde(rename = "chat_history")]
    ChatHistory { history: Vec<GameChatEntry> },
    #[serde(rename = "enemy_left")]
    EnemyLeft,
    #[serde(rename = "new_game")]
    NewGame,
}

/// Internal channel-layer events for `lobby_users`, `user_<username>` and chat-id groups.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub enum LobbyGroupEvent {
    UserListRefresh,
    InviteStateRefresh,
    InviteAccepted { from: Username },
    InviteDeclined { from: Username },
    ChatNotify { from: Username },
    ChatHistory { chat_id: String },
    InGame { game_id: GameId },
}

/// Internal channel-layer events for the `game_id` match group.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub enum GameGroupEvent {
    GameUpdate,
    ChatHistory,
    EnemyLeft,
    NewGame,
}
