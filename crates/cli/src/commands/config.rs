use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quotebot_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in effective_values(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.push(format!(
        "- directory = {} users, {} channels",
        config.directory.users.len(),
        config.directory.channels.len()
    ));

    lines.join("\n")
}

type Field = (&'static str, String, &'static [&'static str]);

fn field(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    (key_path, value, env_keys)
}

fn effective_values(config: &AppConfig) -> Vec<Field> {
    let plugin = &config.plugin;
    let storage = &config.storage;
    let team_id =
        if plugin.team_id.is_empty() { "<unset>".to_string() } else { plugin.team_id.clone() };

    vec![
        field("plugin.trigger", plugin.trigger.clone(), &["QUOTEBOT_PLUGIN_TRIGGER"]),
        field("plugin.team_id", team_id, &["QUOTEBOT_PLUGIN_TEAM_ID"]),
        field(
            "plugin.post_channel",
            plugin.post_channel.clone(),
            &["QUOTEBOT_PLUGIN_POST_CHANNEL"],
        ),
        field(
            "plugin.post_interval_minutes",
            plugin.post_interval_minutes.to_string(),
            &["QUOTEBOT_PLUGIN_POST_INTERVAL_MINUTES"],
        ),
        field("plugin.post_user", plugin.post_user.clone(), &["QUOTEBOT_PLUGIN_POST_USER"]),
        field("storage.url", storage.url.clone(), &["QUOTEBOT_STORAGE_URL"]),
        field(
            "storage.max_connections",
            storage.max_connections.to_string(),
            &["QUOTEBOT_STORAGE_MAX_CONNECTIONS"],
        ),
        field(
            "storage.timeout_secs",
            storage.timeout_secs.to_string(),
            &["QUOTEBOT_STORAGE_TIMEOUT_SECS"],
        ),
        field("storage.quotes_key", storage.quotes_key.clone(), &["QUOTEBOT_STORAGE_QUOTES_KEY"]),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["QUOTEBOT_SERVER_BIND_ADDRESS"],
        ),
        field(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["QUOTEBOT_SERVER_HEALTH_CHECK_PORT"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["QUOTEBOT_LOGGING_LEVEL", "QUOTEBOT_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["QUOTEBOT_LOGGING_FORMAT", "QUOTEBOT_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("quotebot.toml"), PathBuf::from("config/quotebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
