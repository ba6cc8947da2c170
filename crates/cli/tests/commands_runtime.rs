use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use quotebot_cli::commands::{doctor, migrate, quotes};
use quotebot_core::store::QuoteStore;
use quotebot_db::{connect_with_settings, SqlKeyValueStore};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(dir.path());
    with_env(&[("QUOTEBOT_STORAGE_URL", url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_trigger() {
    with_env(&[("QUOTEBOT_PLUGIN_TRIGGER", "/quote")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn quotes_list_and_export_read_the_persisted_list() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(dir.path());
    let export_path = dir.path().join("export.json");

    with_env(&[("QUOTEBOT_STORAGE_URL", url.as_str())], || {
        assert_eq!(migrate::run().exit_code, 0);
        seed_quotes(&url, &["first", "line one\nline two"]);

        let listed = quotes::list();
        assert_eq!(listed.exit_code, 0, "{}", listed.output);
        let payload = parse_payload(&listed.output);
        assert_eq!(payload["command"], "quotes list");
        let message = payload["message"].as_str().expect("message");
        assert!(message.starts_with("2 quotes on file under `quotes`"), "{message}");
        assert!(message.contains("* 1 = \"first\""));
        assert!(message.contains("* 2 = \"line one\\nline two\""));

        let exported = quotes::export(&export_path);
        assert_eq!(exported.exit_code, 0, "{}", exported.output);
        let written: Vec<String> =
            serde_json::from_str(&fs::read_to_string(&export_path).expect("export file"))
                .expect("json array");
        assert_eq!(written, vec!["first".to_string(), "line one\nline two".to_string()]);
    });
}

#[test]
fn quotes_list_reports_storage_failure_before_migrations() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("QUOTEBOT_STORAGE_URL", url.as_str())], || {
        let result = quotes::list();
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "storage");
        assert!(payload["message"].as_str().expect("message").contains("quotebot migrate"));
    });
}

#[test]
fn doctor_warns_about_unresolved_directory_and_pending_migrations() {
    with_env(&[("QUOTEBOT_STORAGE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "warnings do not fail doctor");

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "warn");
        let checks = report["checks"].as_array().expect("checks");
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "pass");
        assert_eq!(checks[1]["name"], "directory_readiness");
        assert!(checks[1]["details"].as_str().expect("details").contains("team_id is not set"));
        assert_eq!(checks[2]["name"], "storage_readiness");
        assert_eq!(checks[2]["status"], "warn");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("QUOTEBOT_LOGGING_LEVEL", "loud")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);

        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(lines[0], "doctor: one or more readiness checks failed");
        assert!(lines[1].starts_with("- [fail] config_validation:"));
        assert!(lines[2].starts_with("- [skip] directory_readiness:"));
        assert!(lines[3].starts_with("- [skip] storage_readiness:"));
    });
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("quotebot.db").display())
}

fn seed_quotes(url: &str, texts: &[&str]) {
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
    runtime.block_on(async {
        let pool = connect_with_settings(url, 1, 30).await.expect("connect");
        let store = QuoteStore::new(Arc::new(SqlKeyValueStore::new(pool.clone())), "quotes");
        for text in texts {
            store.add(text).await.expect("add quote");
        }
        pool.close().await;
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "QUOTEBOT_PLUGIN_TRIGGER",
        "QUOTEBOT_PLUGIN_TEAM_ID",
        "QUOTEBOT_PLUGIN_POST_CHANNEL",
        "QUOTEBOT_PLUGIN_POST_INTERVAL_MINUTES",
        "QUOTEBOT_PLUGIN_POST_USER",
        "QUOTEBOT_STORAGE_URL",
        "QUOTEBOT_STORAGE_MAX_CONNECTIONS",
        "QUOTEBOT_STORAGE_TIMEOUT_SECS",
        "QUOTEBOT_STORAGE_QUOTES_KEY",
        "QUOTEBOT_SERVER_BIND_ADDRESS",
        "QUOTEBOT_SERVER_HEALTH_CHECK_PORT",
        "QUOTEBOT_LOGGING_LEVEL",
        "QUOTEBOT_LOGGING_FORMAT",
        "QUOTEBOT_LOG_LEVEL",
        "QUOTEBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
