//! `tracing-subscriber` setup. The configured toggles translate into
//! per-target filter directives; `RUST_LOG` still wins when set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub fn init(config: &LoggingConfig) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if config.debug { "debug" } else { "info" })
    });

    let directives = [
        (config.requests, "werewolf_game_server_lib=debug"),
        (config.views, "werewolf_game_server_lib::view=debug"),
        (config.storage, "werewolf_game_server_lib::store=debug"),
        (config.transport, "werewolf_game_server::net=debug"),
    ];
    for (enabled, directive) in directives {
        if enabled {
            filter = filter.add_directive(directive.parse().expect("static directive"));
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
