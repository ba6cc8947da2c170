use std::sync::Arc;

use quotebot_core::config::AppConfig;
use quotebot_core::directory::StaticDirectory;
use quotebot_core::host::{HostServices, PostCreator};
use quotebot_db::{connect_storage, migrations, DbPool, SqlKeyValueStore};
use quotebot_plugin::commands::CommandParseError;
use quotebot_plugin::{QuotebotOptions, QuotebotPlugin};
use thiserror::Error;
use tracing::info;

use crate::stdio::{stdio, StdioTransport};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub plugin: Arc<QuotebotPlugin>,
    pub transport: Arc<StdioTransport>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("plugin could not be built: {0}")]
    Plugin(#[from] CommandParseError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_storage(&config.storage).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let transport = Arc::new(stdio());
    let plugin = Arc::new(build_plugin(&config, db_pool.clone(), transport.clone())?);

    Ok(Application { config, db_pool, plugin, transport })
}

/// Wires the SQLite key-value store, the configured directory and `posts` into a plugin.
pub fn build_plugin(
    config: &AppConfig,
    db_pool: DbPool,
    posts: Arc<dyn PostCreator>,
) -> Result<QuotebotPlugin, BootstrapError> {
    let directory = Arc::new(StaticDirectory::from_config(&config.directory));
    info!(
        event_name = "system.bootstrap.directory_loaded",
        correlation_id = "bootstrap",
        users = directory.user_count(),
        channels = directory.channel_count(),
        "host directory loaded"
    );

    let host = HostServices {
        identity: directory.clone(),
        channels: directory,
        kv: Arc::new(SqlKeyValueStore::new(db_pool)),
        posts,
    };
    Ok(QuotebotPlugin::new(host, QuotebotOptions::from_config(config))?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::BufReader;

    use quotebot_core::config::AppConfig;
    use quotebot_core::host::{ChannelInfo, UserProfile};
    use quotebot_db::connect_with_settings;
    use quotebot_db::migrations;
    use quotebot_plugin::CommandArgs;

    use crate::bootstrap::{bootstrap_with_config, build_plugin, BootstrapError};
    use crate::stdio::LineTransport;

    #[tokio::test]
    async fn bootstrap_rejects_unusable_trigger() {
        let mut config = AppConfig::default();
        config.storage.url = "sqlite::memory:".to_string();
        config.plugin.trigger = "two words".to_string();

        let error = bootstrap_with_config(config).await.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Plugin(_)), "{error}");
    }

    #[tokio::test]
    async fn wired_plugin_persists_quotes_in_sqlite() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");

        let mut config = AppConfig::default();
        config.plugin.team_id = "T1".to_string();
        config.directory.users.push(UserProfile {
            id: "U1".to_string(),
            username: "alice".to_string(),
            roles: "system_user".to_string(),
        });
        config.directory.channels.push(ChannelInfo {
            id: "C1".to_string(),
            team_id: "T1".to_string(),
            name: "town-square".to_string(),
            display_name: "Town Square".to_string(),
        });

        let posts = Arc::new(LineTransport::new(BufReader::new(&b""[..]), Vec::<u8>::new()));
        let plugin = build_plugin(&config, pool.clone(), posts).expect("plugin");
        let report = plugin.on_activate().await;
        assert!(report.channel_resolved);

        let args = CommandArgs {
            command: "/quote add stored in sqlite".to_string(),
            user_id: "U1".to_string(),
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            request_id: "req-1".to_string(),
        };
        plugin.execute_command(&args).await.expect("route").expect("response");

        let (value,): (Vec<u8>,) =
            sqlx::query_as("SELECT value FROM plugin_kv WHERE key = 'quotes'")
                .fetch_one(&pool)
                .await
                .expect("stored row");
        assert_eq!(value, br#"["stored in sqlite"]"#.to_vec());

        pool.close().await;
    }

    #[test]
    fn parse_errors_surface_as_plugin_errors() {
        let error = BootstrapError::from(
            quotebot_plugin::commands::CommandParseError::InvalidTrigger("a b".to_string()),
        );
        assert!(error.to_string().starts_with("plugin could not be built"));
    }
}
