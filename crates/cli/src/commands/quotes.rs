use std::fs;
use std::path::Path;
use std::sync::Arc;

use quotebot_core::config::AppConfig;
use quotebot_core::errors::StoreError;
use quotebot_core::store::QuoteStore;
use quotebot_db::{connect_storage, KeyEntry, SqlKeyValueStore};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

type Failure = (&'static str, String, u8);

struct StoredQuotes {
    key: String,
    quotes: Vec<String>,
    entry: Option<KeyEntry>,
}

pub fn list() -> CommandResult {
    match read_quotes("quotes list") {
        Ok(stored) => CommandResult::success("quotes list", render_list(&stored)),
        Err(failure) => failure,
    }
}

pub fn export(path: &Path) -> CommandResult {
    let stored = match read_quotes("quotes export") {
        Ok(stored) => stored,
        Err(failure) => return failure,
    };

    let encoded = match serde_json::to_string_pretty(&stored.quotes) {
        Ok(encoded) => encoded,
        Err(error) => {
            return CommandResult::failure("quotes export", "serialization", error.to_string(), 6)
        }
    };
    if let Err(error) = fs::write(path, format!("{encoded}\n")) {
        return CommandResult::failure(
            "quotes export",
            "export_write",
            format!("could not write `{}`: {error}", path.display()),
            6,
        );
    }

    CommandResult::success(
        "quotes export",
        format!("exported {} quotes to `{}`", stored.quotes.len(), path.display()),
    )
}

fn read_quotes(command: &str) -> Result<StoredQuotes, CommandResult> {
    let config = load_config(command)?;
    let runtime = current_thread_runtime(command)?;

    runtime
        .block_on(fetch(&config))
        .map_err(|(error_class, message, exit_code)| {
            CommandResult::failure(command, error_class, message, exit_code)
        })
}

async fn fetch(config: &AppConfig) -> Result<StoredQuotes, Failure> {
    let pool = connect_storage(&config.storage)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    let key = config.storage.quotes_key.clone();
    let kv = SqlKeyValueStore::new(pool.clone());

    let entry = kv
        .entries()
        .await
        .map_err(|error| {
            ("storage", format!("{error} (has `quotebot migrate` been run?)"), 5u8)
        })?
        .into_iter()
        .find(|entry| entry.key == key);

    let store = QuoteStore::new(Arc::new(kv), key.clone());
    let loaded = store.load().await;
    pool.close().await;

    match loaded {
        Ok(_) => Ok(StoredQuotes { key, quotes: store.snapshot().await, entry }),
        Err(StoreError::Deserialization(message)) => Err(("quote_decode", message, 5)),
        Err(error) => Err(("storage", error.to_string(), 5)),
    }
}

fn render_list(stored: &StoredQuotes) -> String {
    let mut header = format!("{} quotes on file under `{}`", stored.quotes.len(), stored.key);
    if let Some(entry) = &stored.entry {
        header.push_str(&format!(
            " ({} bytes, last written {})",
            entry.size_bytes,
            entry.updated_at.to_rfc3339()
        ));
    }

    let mut lines = vec![header];
    lines.extend(
        stored
            .quotes
            .iter()
            .enumerate()
            .map(|(index, quote)| format!("* {} = {quote:?}", index + 1)),
    );
    lines.join("\n")
}
