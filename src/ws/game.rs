//! Serves one client's in-match connection: dispatches game actions to the engine and runs the
//! disconnect grace protocol. Grounded on the same heartbeat/session shape as the lobby handler,
//! with an extra `joined` flag since the grace protocol only fires for a session that actually
//! made it past the open-time authorization check.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use uuid::Uuid;

use crate::chat::{self, ChatAccess, ChatMsgType, GameChatEntry};
use crate::game::engine::MoveResult;
use crate::game::{GameId, Username};
use crate::lib::{auth::Claims, Result};
use crate::match_status::{self, ConnectionState};
use crate::presence;
use crate::ws::protocol::{GameAction, GameGroupEvent, GameOutbound};
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_GRACE: Duration = Duration::from_secs(10);

pub async fn entrypoint(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    claims: Claims,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let game_id = GameId(path.into_inner());
    ws::start(
        GameSession { hb: Instant::now(), id: Uuid::new_v4(), user: claims.username, game_id, state, joined: false },
        &req,
        stream,
    )
    .map_err(Into::into)
}

pub struct GameSession {
    hb: Instant,
    id: Uuid,
    user: Username,
    game_id: GameId,
    state: web::Data<AppState>,
    /// Whether open-time authorization succeeded and this session actually joined the match
    /// group. The disconnect grace protocol only runs for sessions that got this far.
    joined: bool,
}

impl GameSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn group(&self) -> String {
        self.game_id.to_string()
    }

    fn push_chat(&self, entry: GameChatEntry) {
        chat::push_game_message(&self.state.store, &self.game_id, entry);
    }

    fn broadcast_update(&self) {
        self.state.game_channel.group_send(&self.group(), GameGroupEvent::GameUpdate);
    }

    fn broadcast_chat(&self) {
        self.state.game_channel.group_send(&self.group(), GameGroupEvent::ChatHistory);
    }

    fn system_message(&self, msg: String, access: ChatAccess) {
        self.push_chat(GameChatEntry { from: self.user.clone(), msg_type: ChatMsgType::System, msg, access });
    }

    /// Rule violations are delivered as a private system chat line to the acting player, rather
    /// than a transport-level error: see the error handling design.
    fn rule_violation(&self, message: String) {
        self.system_message(message, ChatAccess::Private);
        self.broadcast_chat();
    }

    fn players_disconnect(&self, p1: &Username, p2: &Username) -> HashMap<Username, bool> {
        let mut map = HashMap::new();
        for player in [p1, p2] {
            let disconnected = match_status::get(&self.state.store, &self.game_id, player).connection.is_disconnected();
            map.insert(player.clone(), disconnected);
        }
        map
    }

    fn handle_action(&mut self, action: GameAction, ctx: &mut ws::WebsocketContext<Self>) {
        let _ = ctx;
        if !matches!(action, GameAction::LeaveGame) {
            presence::mark_online(&self.state.store, &self.user).ok();
        }

        match action {
            GameAction::PlaceShip { x, y, length, orientation } => {
                match self.state.engine.place_ship(&self.game_id, &self.user, x, y, length, orientation) {
                    Ok(()) => self.broadcast_update(),
                    Err(err) => self.rule_violation(err.message()),
                }
            }
            GameAction::RemoveShip { x, y } => {
                match self.state.engine.remove_ship(&self.game_id, &self.user, x, y) {
                    Ok(()) => self.broadcast_update(),
                    Err(err) => self.rule_violation(err.message()),
                }
            }
            GameAction::SetReady => {
                match self.state.engine.set_ready(&self.game_id, &self.user) {
                    Ok(()) => {
                        self.system_message(format!("{} IS READY", self.user.as_str().to_uppercase()), ChatAccess::Public);
                        self.broadcast_update();
                        self.broadcast_chat();
                    }
                    Err(err) => self.rule_violation(err.message()),
                }
            }
            GameAction::MakeMove { x, y } => {
                match self.state.engine.make_move(&self.game_id, &self.user, x, y) {
                    Ok(outcome) => {
                        let shooter = self.user.as_str().to_uppercase();
                        let msg = match outcome.result {
                            MoveResult::Miss => format!("{} MISSED", shooter),
                            MoveResult::Hit => format!("{} LANDED A HIT", shooter),
                            MoveResult::Sunk => format!("{} SUNK ENEMY SHIP", shooter),
                            MoveResult::Win => format!("GAME OVER! {} WON!", shooter),
                        };
                        self.system_message(msg, ChatAccess::Public);
                        self.broadcast_update();
                        self.broadcast_chat();
                    }
                    Err(err) => self.rule_violation(err.message()),
                }
            }
            GameAction::RestartGame => {
                match_status::set_restart(&self.state.store, &self.game_id, &self.user, true);
                self.system_message(format!("{} VOTED FOR A REMATCH", self.user.as_str().to_uppercase()), ChatAccess::Public);
                self.broadcast_chat();

                if let Ok(view) = self.state.engine.get_game_state(&self.game_id, &self.user) {
                    let (p1, p2) = view.players;
                    if match_status::both_restarting(&self.state.store, &self.game_id, &p1, &p2) {
                        let new_id = self.state.engine.create_game(p1, p2);
                        match_status::clear(&self.state.store, &new_id);
                        self.state.game_channel.group_send(&new_id.to_string(), GameGroupEvent::NewGame);
                        self.state.game_channel.group_send(&new_id.to_string(), GameGroupEvent::GameUpdate);
                    }
                }
            }
            GameAction::SendMsg { sender, msg, access } => {
                self.push_chat(GameChatEntry { from: sender, msg_type: ChatMsgType::User, msg, access });
                self.broadcast_chat();
            }
            GameAction::Ping => {}
            GameAction::LeaveGame => {
                match_status::set_connection(&self.state.store, &self.game_id, &self.user, ConnectionState::Full);
            }
        }
    }

    /// Steps 2-4 of the disconnect grace protocol. Detached from the session so it survives the
    /// socket closing; must tolerate the game or status hash already being gone when it wakes.
    async fn run_disconnect_grace(state: web::Data<AppState>, game_id: GameId, session_id: Uuid, user: Username) {
        let already_full = match_status::get(&state.store, &game_id, &user).connection == ConnectionState::Full;
        if !already_full {
            tokio::time::sleep(DISCONNECT_GRACE).await;
            if match_status::get(&state.store, &game_id, &user).connection != ConnectionState::Temporary {
                // Reconnected and cleared its own flag before the grace period elapsed.
                return;
            }
            match_status::set_connection(&state.store, &game_id, &user, ConnectionState::Full);
        }
        Self::handle_full_disconnect(state, game_id, session_id, user).await;
    }

    async fn handle_full_disconnect(state: web::Data<AppState>, game_id: GameId, session_id: Uuid, user: Username) {
        state.game_channel.group_discard(&game_id.to_string(), &session_id);

        let cleanup_store = state.clone();
        let cleanup_user = user.clone();
        actix_rt::spawn(async move {
            chat::cleanup_lobby_chats(&cleanup_store.store, cleanup_user).await;
        });

        let (p1, p2) = match state.engine.get_game_state(&game_id, &user) {
            Ok(view) => view.players,
            // Already torn down by the other player's grace task.
            Err(_) => return,
        };

        if match_status::both_fully_disconnected(&state.store, &game_id, &p1, &p2) {
            chat::delete_game_history(&state.store, &game_id);
            match_status::clear(&state.store, &game_id);
            state.engine.end_game(&game_id);
        } else {
            let entry = GameChatEntry {
                from: user.clone(),
                msg_type: ChatMsgType::System,
                msg: format!("{} HAS LEFT THE GAME", user.as_str().to_uppercase()),
                access: ChatAccess::Public,
            };
            chat::push_game_message(&state.store, &game_id, entry);
            state.game_channel.group_send(&game_id.to_string(), GameGroupEvent::GameUpdate);
            state.game_channel.group_send(&game_id.to_string(), GameGroupEvent::ChatHistory);
            state.game_channel.group_send(&game_id.to_string(), GameGroupEvent::EnemyLeft);
        }
    }
}

impl Actor for GameSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let authorized = self.state.engine.get_game_state(&self.game_id, &self.user).is_ok()
            && match_status::get(&self.state.store, &self.game_id, &self.user).connection != ConnectionState::Full;

        if !authorized {
            ctx.close(Some(ws::CloseReason { code: ws::CloseCode::Other(4000), description: None }));
            ctx.stop();
            return;
        }

        self.joined = true;
        let recipient = ctx.address().recipient();
        self.state.game_channel.group_add(&self.group(), self.id, recipient);
        match_status::set_connection(&self.state.store, &self.game_id, &self.user, ConnectionState::Connected);
        presence::mark_online(&self.state.store, &self.user).ok();

        self.broadcast_update();
        self.broadcast_chat();
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        if self.joined {
            // `leave_game` already upgraded this to `Full`; don't downgrade it back to a
            // transient disconnect and reintroduce a 10s grace period the player didn't need.
            if match_status::get(&self.state.store, &self.game_id, &self.user).connection != ConnectionState::Full {
                match_status::set_connection(&self.state.store, &self.game_id, &self.user, ConnectionState::Temporary);
            }

            let state = self.state.clone();
            let game_id = self.game_id.clone();
            let session_id = self.id;
            let user = self.user.clone();
            actix_rt::spawn(async move {
                Self::run_disconnect_grace(state, game_id, session_id, user).await;
            });
        }
        Running::Stop
    }
}

impl Handler<GameGroupEvent> for GameSession {
    type Result = ();

    fn handle(&mut self, event: GameGroupEvent, ctx: &mut Self::Context) {
        match event {
            GameGroupEvent::GameUpdate => {
                if let Ok(state) = self.state.engine.get_game_state(&self.game_id, &self.user) {
                    let (p1, p2) = state.players.clone();
                    let players_disconnect = self.players_disconnect(&p1, &p2);
                    ctx.text(serde_json::to_string(&GameOutbound::GameState { state, players_disconnect }).unwrap());
                }
            }
            GameGroupEvent::ChatHistory => {
                let history = chat::game_history(&self.state.store, &self.game_id);
                ctx.text(serde_json::to_string(&GameOutbound::ChatHistory { history }).unwrap());
            }
            GameGroupEvent::EnemyLeft => {
                ctx.text(serde_json::to_string(&GameOutbound::EnemyLeft).unwrap());
            }
            GameGroupEvent::NewGame => {
                ctx.text(serde_json::to_string(&GameOutbound::NewGame).unwrap());
            }
        }
    }
}

impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for GameSession {
    fn handle(&mut self, msg: std::result::Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Err(_) => {
                ctx.stop();
                return;
            }
            Ok(msg) => msg,
        };

        match msg {
            ws::Message::Ping(msg) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            ws::Message::Pong(_) => {
                self.hb = Instant::now();
            }
            ws::Message::Text(text) => {
                if let Ok(action) = serde_json::from_str::<GameAction>(&text) {
                    self.handle_action(action, ctx);
                }
            }
            ws::Message::Close(_) | ws::Message::Continuation(_) => ctx.stop(),
            ws::Message::Binary(_) | ws::Message::Nop => (),
        }
    }
}
