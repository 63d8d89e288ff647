//! Serves one client's lobby connection: presence, the user list, invites and 1:1 chat. Grounded
//! on the heartbeat/session shape of Kalaxia's `ClientSession`, generalized to dispatch typed
//! actions instead of a single catch-all `Action`/`data` envelope.

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use uuid::Uuid;

use crate::chat::{self, LobbyChatEntry};
use crate::game::Username;
use crate::invite;
use crate::lib::{auth::Claims, Result};
use crate::match_status::{self, ConnectionState};
use crate::presence;
use crate::ws::protocol::{InviteResponseStatus, LobbyAction, LobbyGroupEvent, LobbyOutbound};
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn entrypoint(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    claims: Claims,
) -> Result<HttpResponse> {
    ws::start(
        LobbySession { hb: Instant::now(), id: Uuid::new_v4(), user: claims.username, state },
        &req,
        stream,
    )
    .map_err(Into::into)
}

pub struct LobbySession {
    hb: Instant,
    id: Uuid,
    user: Username,
    state: web::Data<AppState>,
}

impl LobbySession {
    fn user_group(user: &Username) -> String {
        format!("user_{}", user)
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn refresh_presence(&self) {
        presence::mark_online(&self.state.store, &self.user).ok();
    }

    fn push_invite_state(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let state = invite::state(&self.state.store, &self.user);
        ctx.text(serde_json::to_string(&LobbyOutbound::from(state)).unwrap());
    }

    /// 60s then poll every 5s until both sides of the invite have vanished, per the expiry
    /// watcher design. Detached from the session: it must survive this socket closing.
    fn spawn_invite_watcher(state: web::Data<AppState>, from: Username, to: Username) {
        actix_rt::spawn(async move {
            tokio::time::sleep(invite::WATCHER_INITIAL_SLEEP).await;
            loop {
                if invite::is_expired(&state.store, &from, &to) {
                    state.lobby_channel.group_send(&Self::user_group(&from), LobbyGroupEvent::InviteStateRefresh);
                    state.lobby_channel.group_send(&Self::user_group(&to), LobbyGroupEvent::InviteStateRefresh);
                    return;
                }
                tokio::time::sleep(invite::WATCHER_POLL_INTERVAL).await;
            }
        });
    }

    fn handle_action(&mut self, action: LobbyAction, ctx: &mut ws::WebsocketContext<Self>) {
        self.refresh_presence();

        match action {
            LobbyAction::Ping => {}

            LobbyAction::Invite { to } => {
                invite::add_invite(&self.state.store, &self.user, &to);
                Self::spawn_invite_watcher(self.state.clone(), self.user.clone(), to.clone());
                self.state.lobby_channel.group_send(&Self::user_group(&self.user), LobbyGroupEvent::InviteStateRefresh);
                self.state.lobby_channel.group_send(&Self::user_group(&to), LobbyGroupEvent::InviteStateRefresh);
            }

            LobbyAction::InviteResponse { from, status } => {
                invite::remove_invite(&self.state.store, &from, &self.user);
                match status {
                    InviteResponseStatus::Accepted => {
                        let game_id = self.state.engine.create_game(from.clone(), self.user.clone());
                        match_status::clear(&self.state.store, &game_id);
                        self.state.lobby_channel.group_send(
                            &Self::user_group(&from),
                            LobbyGroupEvent::InviteAccepted { from: self.user.clone() },
                        );
                        ctx.text(serde_json::to_string(&LobbyOutbound::InGame { game_id }).unwrap());
                    }
                    InviteResponseStatus::Declined => {
                        self.state.lobby_channel.group_send(
                            &Self::user_group(&from),
                            LobbyGroupEvent::InviteDeclined { from: self.user.clone() },
                        );
                        self.state.lobby_channel.group_send(&Self::user_group(&from), LobbyGroupEvent::InviteStateRefresh);
                        self.push_invite_state(ctx);
                    }
                }
            }

            LobbyAction::InviteCancel { to } => {
                invite::remove_invite(&self.state.store, &self.user, &to);
                self.state.lobby_channel.group_send(&Self::user_group(&self.user), LobbyGroupEvent::InviteStateRefresh);
                self.state.lobby_channel.group_send(&Self::user_group(&to), LobbyGroupEvent::InviteStateRefresh);
            }

            LobbyAction::SendMsg { chat_with, msg } => {
                let chat_id = chat::lobby_chat_id(&self.user, &chat_with);
                chat::push_lobby_message(&self.state.store, &self.user, &chat_with, LobbyChatEntry { from: self.user.clone(), msg });
                self.state.lobby_channel.group_send(&chat_id, LobbyGroupEvent::ChatHistory { chat_id: chat_id.clone() });
                self.state.lobby_channel.group_send(&Self::user_group(&chat_with), LobbyGroupEvent::ChatNotify { from: self.user.clone() });
            }

            LobbyAction::JoinChat { chat_with } => {
                let chat_id = chat::lobby_chat_id(&self.user, &chat_with);
                chat::index_lobby_chat(&self.state.store, &self.user, &chat_id);
                self.state.lobby_channel.group_add(&chat_id, self.id, ctx.address().recipient());
                self.state.lobby_channel.group_send(&chat_id, LobbyGroupEvent::ChatHistory { chat_id });
            }
        }
    }
}

impl Actor for LobbySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let recipient = ctx.address().recipient();
        self.state.lobby_channel.group_add("lobby_users", self.id, recipient.clone());
        self.state.lobby_channel.group_add(&Self::user_group(&self.user), self.id, recipient);

        presence::join_lobby(&self.state.store, &self.user).ok();
        self.refresh_presence();

        if let Some(game_id) = self.state.engine.find_for_user(&self.user) {
            if match_status::get(&self.state.store, &game_id, &self.user).connection != ConnectionState::Full {
                ctx.text(serde_json::to_string(&LobbyOutbound::InGame { game_id }).unwrap());
            }
        }

        self.state.lobby_channel.group_send("lobby_users", LobbyGroupEvent::UserListRefresh);
        self.push_invite_state(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        self.state.lobby_channel.discard_everywhere(&self.id);
        presence::leave_lobby(&self.state.store, &self.user).ok();
        self.state.lobby_channel.group_send("lobby_users", LobbyGroupEvent::UserListRefresh);

        let state = self.state.clone();
        let user = self.user.clone();
        actix_rt::spawn(async move {
            chat::cleanup_lobby_chats(&state.store, user).await;
        });

        Running::Stop
    }
}

impl Handler<LobbyGroupEvent> for LobbySession {
    type Result = ();

    fn handle(&mut self, event: LobbyGroupEvent, ctx: &mut Self::Context) {
        match event {
            LobbyGroupEvent::UserListRefresh => {
                let users = presence::lobby_roster(&self.state.store);
                ctx.text(serde_json::to_string(&LobbyOutbound::UserList { users, self_user: self.user.clone() }).unwrap());
            }
            LobbyGroupEvent::InviteStateRefresh => self.push_invite_state(ctx),
            LobbyGroupEvent::InviteAccepted { from } => {
                ctx.text(serde_json::to_string(&LobbyOutbound::InviteAccepted { from }).unwrap());
            }
            LobbyGroupEvent::InviteDeclined { from } => {
                ctx.text(serde_json::to_string(&LobbyOutbound::InviteDeclined { from }).unwrap());
            }
            LobbyGroupEvent::ChatNotify { from } => {
                ctx.text(serde_json::to_string(&LobbyOutbound::ChatNotify { from }).unwrap());
            }
            LobbyGroupEvent::ChatHistory { chat_id } => {
                let history = chat::lobby_history(&self.state.store, &chat_id);
                ctx.text(serde_json::to_string(&LobbyOutbound::ChatHistory { history }).unwrap());
            }
            LobbyGroupEvent::InGame { game_id } => {
                ctx.text(serde_json::to_string(&LobbyOutbound::InGame { game_id }).unwrap());
            }
        }
    }
}

impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for LobbySession {
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
            ws::Message::Text(text) => match serde_json::from_str::<LobbyAction>(&text) {
                Ok(action) => self.handle_action(action, ctx),
                Err(err) => {
                    ctx.text(serde_json::to_string(&LobbyOutbound::Error { message: err.to_string() }).unwrap());
                }
            },
            ws::Message::Close(_) | ws::Message::Continuation(_) => ctx.stop(),
            ws::Message::Binary(_) | ws::Message::Nop => (),
        }
    }
}

