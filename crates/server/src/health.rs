use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use quotebot_db::DbPool;
use quotebot_plugin::QuotebotPlugin;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    plugin: Arc<QuotebotPlugin>,
}

impl HealthState {
    pub fn new(db_pool: DbPool, plugin: Arc<QuotebotPlugin>) -> Self {
        Self { db_pool, plugin }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub plugin: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let plugin = plugin_check(&state.plugin).await;
    let ready = database.status == "ready" && plugin.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        plugin,
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn plugin_check(plugin: &QuotebotPlugin) -> HealthCheck {
    if !plugin.is_active() {
        return HealthCheck { status: "degraded", detail: "plugin is not active".to_string() };
    }
    let quotes = plugin.bot().store().len().await;
    let channel = if plugin.bot().targets().await.channel_id.is_some() {
        "monitored channel resolved"
    } else {
        "monitored channel unresolved"
    };
    HealthCheck { status: "ready", detail: format!("{quotes} quotes loaded; {channel}") }
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
