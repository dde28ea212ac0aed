//! Configuration loading. Sources, lowest priority first: built-in
//! defaults, `WEREWOLF_*` environment variables, the on-disk JSON
//! document, command-line flags.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use werewolf_game_server_lib::game::MatchSettings;

/// Command-line flags: the highest-priority configuration source.
/// Logging flags only switch subsystems on; use the config document or
/// environment to switch a default off.
#[derive(Parser, Debug)]
#[command(name = "werewolf-game-server", version, about = "Werewolf game server")]
pub struct Cli {
    /// Path to a JSON configuration document.
    #[arg(long, env = "WEREWOLF_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub listen: Option<String>,

    /// Database journal location. Matches live in memory when omitted.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Log accepted and rejected intents.
    #[arg(long)]
    pub log_requests: bool,

    /// Log view projection.
    #[arg(long)]
    pub log_views: bool,

    /// Log storage writes.
    #[arg(long)]
    pub log_storage: bool,

    /// Log transport connections and framing.
    #[arg(long)]
    pub log_transport: bool,

    /// Debug logging everywhere.
    #[arg(long)]
    pub log_debug: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub requests: bool,
    pub views: bool,
    pub storage: bool,
    pub transport: bool,
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            requests: false,
            views: false,
            storage: false,
            transport: false,
            debug: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub database: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub rules: MatchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9000".to_string(),
            database: None,
            logging: LoggingConfig::default(),
            rules: MatchSettings::default(),
        }
    }
}

/// Builds the effective configuration for this process.
pub fn load(cli: &Cli) -> Config {
    let mut config = Config::default();

    apply_env(&mut config);

    let document = cli
        .config
        .clone()
        .or_else(|| Path::new("config.json").exists().then(|| "config.json".into()));
    if let Some(path) = document {
        merge_document(&mut config, &path);
    }

    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }
    if let Some(database) = &cli.database {
        config.database = Some(database.clone());
    }
    config.logging.requests |= cli.log_requests;
    config.logging.views |= cli.log_views;
    config.logging.storage |= cli.log_storage;
    config.logging.transport |= cli.log_transport;
    config.logging.debug |= cli.log_debug;

    config
}

fn env_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes" | "on")
}

fn apply_env(config: &mut Config) {
    if let Ok(listen) = env::var("WEREWOLF_LISTEN") {
        config.listen = listen;
    }
    if let Ok(database) = env::var("WEREWOLF_DATABASE") {
        config.database = Some(PathBuf::from(database));
    }
    for (var, toggle) in [
        ("WEREWOLF_LOG_REQUESTS", &mut config.logging.requests),
        ("WEREWOLF_LOG_VIEWS", &mut config.logging.views),
        ("WEREWOLF_LOG_STORAGE", &mut config.logging.storage),
        ("WEREWOLF_LOG_TRANSPORT", &mut config.logging.transport),
        ("WEREWOLF_LOG_DEBUG", &mut config.logging.debug),
    ] {
        if let Ok(value) = env::var(var) {
            *toggle = env_truthy(&value);
        }
    }
}

/// Overlays a partial JSON document on top of the current configuration.
/// Unreadable or malformed documents are reported and skipped.
fn merge_document(config: &mut Config, path: &Path) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("failed to read config from {}: {err}", path.display());
            return;
        }
    };

    let document = match serde_json::from_str::<Value>(&contents) {
        Ok(document) => document,
        Err(err) => {
            eprintln!("failed to parse config from {}: {err}", path.display());
            return;
        }
    };

    let mut merged = match serde_json::to_value(&*config) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("failed to serialize config defaults: {err}");
            return;
        }
    };
    merge_values(&mut merged, document);

    match serde_json::from_value(merged) {
        Ok(updated) => *config = updated,
        Err(err) => {
            eprintln!(
                "config document {} does not match the expected shape: {err}",
                path.display()
            );
        }
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
