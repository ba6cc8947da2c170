use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{ChannelInfo, UserProfile};
use crate::settings::{
    SettingsUpdate, DEFAULT_POST_CHANNEL, DEFAULT_POST_INTERVAL_MINUTES, DEFAULT_POST_USER,
    MAX_POST_INTERVAL_MINUTES,
};
use crate::store::DEFAULT_QUOTES_KEY;

pub const DEFAULT_TRIGGER: &str = "quote";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub plugin: PluginConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub directory: DirectoryConfig,
}

#[derive(Clone, Debug)]
pub struct PluginConfig {
    pub trigger: String,
    pub team_id: String,
    pub post_channel: String,
    pub post_interval_minutes: f64,
    pub post_user: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub quotes_key: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub storage_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugin: PluginConfig {
                trigger: DEFAULT_TRIGGER.to_string(),
                team_id: String::new(),
                post_channel: DEFAULT_POST_CHANNEL.to_string(),
                post_interval_minutes: DEFAULT_POST_INTERVAL_MINUTES,
                post_user: DEFAULT_POST_USER.to_string(),
            },
            storage: StorageConfig {
                url: "sqlite://quotebot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                quotes_key: DEFAULT_QUOTES_KEY.to_string(),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            directory: DirectoryConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PluginConfig {
    /// The configured values as the host would push them on a configuration change.
    pub fn settings_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            post_interval_minutes: Some(self.post_interval_minutes),
            post_channel: Some(self.post_channel.clone()),
            post_user: Some(self.post_user.clone()),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("quotebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(plugin) = patch.plugin {
            if let Some(trigger) = plugin.trigger {
                self.plugin.trigger = trigger;
            }
            if let Some(team_id) = plugin.team_id {
                self.plugin.team_id = team_id;
            }
            if let Some(post_channel) = plugin.post_channel {
                self.plugin.post_channel = post_channel;
            }
            if let Some(post_interval_minutes) = plugin.post_interval_minutes {
                self.plugin.post_interval_minutes = post_interval_minutes;
            }
            if let Some(post_user) = plugin.post_user {
                self.plugin.post_user = post_user;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(url) = storage.url {
                self.storage.url = url;
            }
            if let Some(max_connections) = storage.max_connections {
                self.storage.max_connections = max_connections;
            }
            if let Some(timeout_secs) = storage.timeout_secs {
                self.storage.timeout_secs = timeout_secs;
            }
            if let Some(quotes_key) = storage.quotes_key {
                self.storage.quotes_key = quotes_key;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(directory) = patch.directory {
            self.directory = directory;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUOTEBOT_PLUGIN_TRIGGER") {
            self.plugin.trigger = value;
        }
        if let Some(value) = read_env("QUOTEBOT_PLUGIN_TEAM_ID") {
            self.plugin.team_id = value;
        }
        if let Some(value) = read_env("QUOTEBOT_PLUGIN_POST_CHANNEL") {
            self.plugin.post_channel = value;
        }
        if let Some(value) = read_env("QUOTEBOT_PLUGIN_POST_INTERVAL_MINUTES") {
            self.plugin.post_interval_minutes =
                parse_f64("QUOTEBOT_PLUGIN_POST_INTERVAL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("QUOTEBOT_PLUGIN_POST_USER") {
            self.plugin.post_user = value;
        }

        if let Some(value) = read_env("QUOTEBOT_STORAGE_URL") {
            self.storage.url = value;
        }
        if let Some(value) = read_env("QUOTEBOT_STORAGE_MAX_CONNECTIONS") {
            self.storage.max_connections = parse_u32("QUOTEBOT_STORAGE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("QUOTEBOT_STORAGE_TIMEOUT_SECS") {
            self.storage.timeout_secs = parse_u64("QUOTEBOT_STORAGE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("QUOTEBOT_STORAGE_QUOTES_KEY") {
            self.storage.quotes_key = value;
        }

        if let Some(value) = read_env("QUOTEBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("QUOTEBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("QUOTEBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("QUOTEBOT_LOGGING_LEVEL").or_else(|| read_env("QUOTEBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUOTEBOT_LOGGING_FORMAT").or_else(|| read_env("QUOTEBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(storage_url) = overrides.storage_url {
            self.storage.url = storage_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_plugin(&self.plugin)?;
        validate_storage(&self.storage)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_directory(&self.directory)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("quotebot.toml"), PathBuf::from("config/quotebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_plugin(plugin: &PluginConfig) -> Result<(), ConfigError> {
    let trigger = plugin.trigger.as_str();
    if trigger.is_empty() || trigger.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "plugin.trigger must be a single non-empty word".to_string(),
        ));
    }
    if trigger.starts_with('/') {
        return Err(ConfigError::Validation(
            "plugin.trigger must not include the leading `/`".to_string(),
        ));
    }

    let interval = plugin.post_interval_minutes;
    if !interval.is_finite() || interval < 0.0 || interval > MAX_POST_INTERVAL_MINUTES as f64 {
        return Err(ConfigError::Validation(format!(
            "plugin.post_interval_minutes must be in range 0..={MAX_POST_INTERVAL_MINUTES} \
             (0 selects the default)"
        )));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    let url = storage.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "storage.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if storage.max_connections == 0 {
        return Err(ConfigError::Validation(
            "storage.max_connections must be greater than zero".to_string(),
        ));
    }

    if storage.timeout_secs == 0 || storage.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "storage.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if storage.quotes_key.trim().is_empty() {
        return Err(ConfigError::Validation("storage.quotes_key must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_directory(directory: &DirectoryConfig) -> Result<(), ConfigError> {
    if let Some(user) = directory.users.iter().find(|user| user.id.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "directory.users entry `{}` is missing an id",
            user.username
        )));
    }
    if let Some(channel) = directory.channels.iter().find(|channel| channel.id.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "directory.channels entry `{}` is missing an id",
            channel.name
        )));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    plugin: Option<PluginPatch>,
    storage: Option<StoragePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    directory: Option<DirectoryConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginPatch {
    trigger: Option<String>,
    team_id: Option<String>,
    post_channel: Option<String>,
    post_interval_minutes: Option<f64>,
    post_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    quotes_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
