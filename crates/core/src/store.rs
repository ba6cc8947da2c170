//! The ordered quote list and its key-value persistence.
//!
//! Quotes have no identity beyond their position: quote number `n` is always
//! `quotes[n - 1]` at the instant of the read. Every mutation re-serializes the whole
//! list under the configured key and only commits to memory once the write succeeded,
//! so memory and the persisted value never diverge inside one process.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::host::KeyValueStore;

pub const DEFAULT_QUOTES_KEY: &str = "quotes";

pub struct QuoteStore {
    key: String,
    kv: Arc<dyn KeyValueStore>,
    quotes: RwLock<Vec<String>>,
}

impl QuoteStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { key: key.into(), kv, quotes: RwLock::new(Vec::new()) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replaces the in-memory list with the persisted one. A missing value is an empty
    /// list; an undecodable one leaves memory untouched.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let raw = self
            .kv
            .get(&self.key)
            .await
            .map_err(|error| StoreError::Persistence(error.to_string()))?;

        let Some(raw) = raw else {
            debug!(event_name = "store.quotes.load_empty", key = %self.key, "no stored quotes");
            return Ok(self.len().await);
        };

        let loaded = decode(&raw)?;
        let count = loaded.len();
        *self.quotes.write().await = loaded;
        info!(event_name = "store.quotes.loaded", key = %self.key, count, "quotes loaded");
        Ok(count)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        let quotes = self.quotes.read().await;
        self.persist(&quotes).await
    }

    /// Appends `text` and returns the new count, which is also the new quote's number.
    pub async fn add(&self, text: &str) -> Result<usize, StoreError> {
        if text.is_empty() {
            return Err(StoreError::EmptyInput);
        }

        let mut quotes = self.quotes.write().await;
        let mut next = quotes.clone();
        next.push(text.to_owned());
        self.persist(&next).await?;
        *quotes = next;
        Ok(quotes.len())
    }

    /// Removes quote `number` (1-based) and returns how many remain.
    pub async fn delete_at(&self, number: i64) -> Result<usize, StoreError> {
        let mut quotes = self.quotes.write().await;
        let index = position(number, quotes.len())
            .ok_or(StoreError::InvalidIndex { requested: number, count: quotes.len() })?;

        let mut next = quotes.clone();
        next.remove(index);
        self.persist(&next).await?;
        *quotes = next;
        Ok(quotes.len())
    }

    pub async fn get(&self, number: i64) -> Option<String> {
        let quotes = self.quotes.read().await;
        position(number, quotes.len()).map(|index| quotes[index].clone())
    }

    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.quotes.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.quotes.read().await.clone()
    }

    /// Uniform pick; a single quote is returned without touching the RNG.
    pub async fn random(&self) -> Option<String> {
        let quotes = self.quotes.read().await;
        pick_random(&quotes)
    }

    async fn persist(&self, quotes: &[String]) -> Result<(), StoreError> {
        let raw = encode(quotes)?;
        self.kv
            .set(&self.key, raw)
            .await
            .map_err(|error| StoreError::Persistence(error.to_string()))?;
        debug!(
            event_name = "store.quotes.saved",
            key = %self.key,
            count = quotes.len(),
            "quotes saved"
        );
        Ok(())
    }
}

fn pick_random(quotes: &[String]) -> Option<String> {
    match quotes.len() {
        0 => None,
        1 => Some(quotes[0].clone()),
        _ => quotes.choose(&mut rand::thread_rng()).cloned(),
    }
}

fn position(number: i64, count: usize) -> Option<usize> {
    if number < 1 {
        return None;
    }
    let index = usize::try_from(number - 1).ok()?;
    (index < count).then_some(index)
}

pub fn encode(quotes: &[String]) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(quotes).map_err(|error| StoreError::Persistence(error.to_string()))
}

pub fn decode(raw: &[u8]) -> Result<Vec<String>, StoreError> {
    serde_json::from_slice::<Vec<String>>(raw)
        .map_err(|error| StoreError::Deserialization(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{QuoteStore, DEFAULT_QUOTES_KEY};
    use crate::errors::{HostError, StoreError};
    use crate::host::KeyValueStore;

    #[derive(Default)]
    struct FlakyKv {
        values: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes: AtomicBool,
        writes: Mutex<usize>,
    }

    impl FlakyKv {
        fn with_value(key: &str, value: &[u8]) -> Self {
            let kv = Self::default();
            kv.values.lock().expect("lock").insert(key.to_owned(), value.to_vec());
            kv
        }

        fn stored(&self, key: &str) -> Option<Vec<u8>> {
            self.values.lock().expect("lock").get(key).cloned()
        }

        fn writes(&self) -> usize {
            *self.writes.lock().expect("lock")
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyKv {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
            Ok(self.stored(key))
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(HostError::Unavailable("kv write refused".to_owned()));
            }
            *self.writes.lock().expect("lock") += 1;
            self.values.lock().expect("lock").insert(key.to_owned(), value);
            Ok(())
        }
    }

    fn store_over(kv: &Arc<FlakyKv>) -> QuoteStore {
        QuoteStore::new(kv.clone(), DEFAULT_QUOTES_KEY)
    }

    #[tokio::test]
    async fn load_without_stored_value_stays_empty() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);

        assert_eq!(store.load().await, Ok(0));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn load_rejects_malformed_blob_without_touching_memory() {
        let kv = Arc::new(FlakyKv::with_value(DEFAULT_QUOTES_KEY, br#"["kept"]"#));
        let store = store_over(&kv);
        store.load().await.expect("initial load");

        kv.values
            .lock()
            .expect("lock")
            .insert(DEFAULT_QUOTES_KEY.to_owned(), br#"{"not":"a list"}"#.to_vec());

        assert!(matches!(store.load().await, Err(StoreError::Deserialization(_))));
        assert_eq!(store.snapshot().await, vec!["kept".to_owned()]);
    }

    #[tokio::test]
    async fn each_add_is_addressable_by_its_number() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);

        for (expected, text) in ["first", "second", "third"].into_iter().enumerate() {
            let count = store.add(text).await.expect("add");
            assert_eq!(count, expected + 1);
            assert_eq!(store.get(count as i64).await.as_deref(), Some(text));
        }
        assert_eq!(kv.writes(), 3);
    }

    #[tokio::test]
    async fn empty_add_is_rejected_and_not_persisted() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);

        assert_eq!(store.add("").await, Err(StoreError::EmptyInput));
        assert_eq!(store.len().await, 0);
        assert_eq!(kv.writes(), 0);
    }

    #[tokio::test]
    async fn delete_shifts_later_quotes_down() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);
        for text in ["A", "B", "C"] {
            store.add(text).await.expect("add");
        }

        assert_eq!(store.delete_at(2).await, Ok(2));
        assert_eq!(store.snapshot().await, vec!["A".to_owned(), "C".to_owned()]);
        assert_eq!(store.get(2).await.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn delete_out_of_range_leaves_store_unchanged() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);

        assert_eq!(
            store.delete_at(1).await,
            Err(StoreError::InvalidIndex { requested: 1, count: 0 })
        );

        store.add("only").await.expect("add");
        for number in [0, -3, 2, i64::MAX] {
            assert!(matches!(store.delete_at(number).await, Err(StoreError::InvalidIndex { .. })));
        }
        assert_eq!(store.snapshot().await, vec!["only".to_owned()]);
        assert_eq!(kv.writes(), 1);
    }

    #[tokio::test]
    async fn failed_write_commits_nothing() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);
        store.add("durable").await.expect("add");
        let persisted = kv.stored(DEFAULT_QUOTES_KEY);

        kv.fail_writes.store(true, Ordering::SeqCst);
        assert!(matches!(store.add("lost").await, Err(StoreError::Persistence(_))));
        assert!(matches!(store.delete_at(1).await, Err(StoreError::Persistence(_))));

        assert_eq!(store.snapshot().await, vec!["durable".to_owned()]);
        assert_eq!(kv.stored(DEFAULT_QUOTES_KEY), persisted);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_order() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);
        for text in ["zeta", "alpha", "line one\nline two", "\"quoted\""] {
            store.add(text).await.expect("add");
        }
        store.save().await.expect("save");
        store.save().await.expect("save again");

        let reloaded = store_over(&kv);
        reloaded.load().await.expect("load");
        assert_eq!(reloaded.snapshot().await, store.snapshot().await);
    }

    #[tokio::test]
    async fn random_is_always_a_current_member() {
        let kv = Arc::new(FlakyKv::default());
        let store = store_over(&kv);
        assert_eq!(store.random().await, None);

        store.add("solo").await.expect("add");
        assert_eq!(store.random().await.as_deref(), Some("solo"));

        store.add("duo").await.expect("add");
        let members = store.snapshot().await;
        for _ in 0..32 {
            let picked = store.random().await.expect("pick");
            assert!(members.contains(&picked));
        }
    }
}
