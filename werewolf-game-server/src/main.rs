//! Process shell: configuration, logging, recovery, transport.

use std::net::TcpListener;

use clap::Parser;
use werewolf_game_server_lib::GameServer;
use werewolf_game_server_lib::GameServerConfig;
use werewolf_game_server_lib::store::JournalStore;
use werewolf_game_server_lib::store::MatchStore;
use werewolf_game_server_lib::store::MemoryStore;

mod config;
mod logging;
mod net;

fn main() -> anyhow::Result<()> {
    let cli = config::Cli::parse();
    let config = config::load(&cli);

    logging::init(&config.logging);

    let store: Box<dyn MatchStore> = match &config.database {
        Some(path) => {
            tracing::info!(path = %path.display(), "using journal store");
            Box::new(JournalStore::open(path)?)
        }
        None => {
            tracing::info!("using in-memory store; matches will not survive a restart");
            Box::new(MemoryStore::new())
        }
    };

    let server = GameServer::recover(
        GameServerConfig {
            rules: config.rules.clone(),
        },
        store,
    )?;

    let listener = TcpListener::bind(&config.listen)?;
    tracing::info!(listen = %config.listen, "werewolf server listening");

    net::serve(listener, server)?;

    Ok(())
}
