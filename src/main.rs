#![allow(clippy::clone_on_copy)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

#![warn(clippy::imprecise_flops)]
#![warn(clippy::suboptimal_flops)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![warn(clippy::float_cmp_const)]
#![warn(clippy::implicit_hasher)]
#![warn(clippy::implicit_saturating_sub)]
#![warn(clippy::large_types_passed_by_value)]
#![warn(clippy::manual_ok_or)]
#![warn(clippy::missing_const_for_fn)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::non_ascii_literal)]
#![warn(clippy::trivially_copy_pass_by_ref)]
#![warn(clippy::type_repetition_in_bounds)]
#![warn(clippy::unreadable_literal)]
#![warn(clippy::unseparated_literal_suffix)]
#![warn(clippy::unused_self)]

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
#[cfg(feature = "ssl-secure")]
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

mod channel;
mod chat;
mod game;
mod invite;
mod lib;
mod match_status;
mod presence;
mod store;
mod ws;

use std::time::Duration;

use channel::ChannelHub;
use game::registry::GameEngine;
use lib::get_env;
use store::InMemoryStore;
use ws::protocol::{GameGroupEvent, LobbyGroupEvent};

/// How often the keyed store sweeps lapsed TTL entries. Purely a memory-bound mitigation (§4.1):
/// every read already treats an expired key as absent, so this only bounds how long dead presence
/// and invite keys linger before being dropped.
const STORE_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Global state of the server: everything the session handlers need to reach from anywhere.
/// Unlike the teacher, there is no database pool here — persistent user records are out of
/// scope (§1) and no game state survives a restart (Non-goals), so `AppState` only ever wraps
/// the three in-process components the core actually owns.
pub struct AppState {
    store: InMemoryStore,
    lobby_channel: ChannelHub<LobbyGroupEvent>,
    game_channel: ChannelHub<GameGroupEvent>,
    engine: GameEngine,
}

impl AppState {
    fn new() -> Self {
        Self {
            store: InMemoryStore::new(),
            lobby_channel: ChannelHub::new(),
            game_channel: ChannelHub::new(),
            engine: GameEngine::new(),
        }
    }
}

fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/lobby/").to(ws::lobby::entrypoint))
        .service(web::resource("/ws/game/{game_id}/").to(ws::game::entrypoint));
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    std::env::set_var("RUST_LOG", get_env("RUST_LOG", "actix_web=info"));
    env_logger::init();

    let state = web::Data::new(AppState::new());

    {
        let state = state.clone();
        actix_rt::spawn(async move {
            loop {
                tokio::time::sleep(STORE_REAP_INTERVAL).await;
                state.store.reap_expired();
            }
        });
    }

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(config)
    });

    #[cfg(feature = "ssl-secure")]
    {
        let key = get_env("SSL_PRIVATE_KEY", "../var/ssl/key.pem");
        let cert = get_env("SSL_CERTIFICATE", "../var/ssl/cert.pem");

        let mut ssl_config = SslAcceptor::mozilla_intermediate(SslMethod::tls()).unwrap();
        ssl_config.set_private_key_file(key, SslFiletype::PEM).unwrap();
        ssl_config.set_certificate_chain_file(cert).unwrap();

        server = server.bind_openssl(get_env("LISTENING_URL", "127.0.0.1:443"), ssl_config)?;
    }
    #[cfg(not(feature = "ssl-secure"))]
    {
        server = server.bind(get_env("LISTENING_URL", "127.0.0.1:8080"))?;
    }
    server.run().await
}
