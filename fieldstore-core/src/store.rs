use std::time::{Duration, Instant};

use crate::config::StoreConfig;
use crate::expiry::{self, Expirations, Liveness, Records};

/// Truncates a key for logging
pub(crate) fn log_key(key: &str) -> String {
    const MAX_LOG_CHARS: usize = 16;
    match key.char_indices().nth(MAX_LOG_CHARS) {
        Some((idx, _)) => format!("{}...", &key[..idx]),
        None => key.to_string(),
    }
}

/// Embedded key-field-value store with lazy TTL expiration
///
/// Each record is a string key holding a map of field names to string values.
/// Expiration is enforced when a record is touched and by [`Store::expire_sweep`];
/// nothing runs in the background.
///
/// The store is single-threaded: mutations take `&mut self`. Callers that need
/// to share it across threads must serialize every call behind one lock.
///
/// # Example
///
/// ```rust
/// use fieldstore_core::Store;
///
/// let mut store = Store::new();
/// store.set("user:1", "name", "Alice");
/// store.set("user:1", "team", "storage");
/// store.set_ttl("user:1", 300);
///
/// assert_eq!(store.get("user:1", "name"), Some("Alice".to_string()));
/// assert_eq!(store.get_records_by_field_value("team", "storage"), vec!["user:1"]);
/// ```
#[derive(Debug)]
pub struct Store {
    pub(crate) records: Records,
    pub(crate) expirations: Expirations,
    pub(crate) max_ttl: Duration,
}

impl Store {
    /// Creates an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store with custom configuration
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            records: Records::with_capacity(config.initial_capacity),
            expirations: Expirations::new(),
            max_ttl: config.max_ttl,
        }
    }

    /// Resolves whether `key` currently exists, has expired, or is absent.
    pub fn liveness(&self, key: &str) -> Liveness {
        self.liveness_at(key, Instant::now())
    }

    pub(crate) fn liveness_at(&self, key: &str, now: Instant) -> Liveness {
        expiry::resolve(&self.records, &self.expirations, key, now)
    }

    /// Removes `key` from both the record store and the expiration index.
    ///
    /// Returns whether the record store held the key.
    fn purge(&mut self, key: &str) -> bool {
        self.expirations.remove(key);
        self.records.remove(key).is_some()
    }

    /// Resolves `key` for a write, purging it first if it has expired.
    fn resolve_for_write(&mut self, key: &str, now: Instant) -> Liveness {
        let liveness = self.liveness_at(key, now);
        if liveness == Liveness::Expired {
            tracing::debug!("Purging expired record {}", log_key(key));
            self.purge(key);
        }
        liveness
    }

    /// Sets `field` to `value` on the record `key`, creating the record if needed.
    ///
    /// An expired record is purged first, so the write starts a fresh record
    /// without the old fields or TTL.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        let key = key.into();
        self.resolve_for_write(&key, Instant::now());

        self.records
            .entry(key)
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Removes `field` from the record `key`.
    ///
    /// Returns `true` if the field was removed. Removing the last field deletes
    /// the record along with its TTL.
    #[must_use = "returns whether the field existed"]
    pub fn delete_field(&mut self, key: &str, field: &str) -> bool {
        if !self.resolve_for_write(key, Instant::now()).is_live() {
            return false;
        }

        let Some(fields) = self.records.get_mut(key) else {
            return false;
        };
        if fields.remove(field).is_none() {
            return false;
        }

        if fields.is_empty() {
            tracing::debug!("Record {} emptied, removing it", log_key(key));
            self.purge(key);
        }
        true
    }

    /// Deletes the record `key` and its TTL.
    ///
    /// Returns `true` if the key was in the store, whether or not it had expired.
    #[must_use = "returns whether the record existed"]
    pub fn delete_record(&mut self, key: &str) -> bool {
        self.purge(key)
    }

    /// Arms a TTL of `seconds` on the record `key`, replacing any previous one.
    ///
    /// Does nothing unless the record currently exists; an expired record is
    /// purged instead. Zero or negative `seconds` expires the record at once.
    /// Positive values above [`StoreConfig::max_ttl`] are clamped.
    pub fn set_ttl(&mut self, key: &str, seconds: i64) {
        let now = Instant::now();
        if !self.resolve_for_write(key, now).is_live() {
            return;
        }

        let expires_at = expiry::expiration_instant(now, seconds, self.max_ttl);
        self.expirations.insert(key.to_string(), expires_at);
    }

    /// Purges every record whose TTL has elapsed.
    ///
    /// Returns the number of records removed.
    pub fn expire_sweep(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .expirations
            .keys()
            .filter(|key| self.liveness_at(key, now) == Liveness::Expired)
            .cloned()
            .collect();

        let removed = expired.len();
        for key in &expired {
            self.purge(key);
        }

        if removed > 0 {
            tracing::debug!("Expiration sweep removed {} records", removed);
        }
        removed
    }

    /// Deletes every record and TTL.
    ///
    /// Returns the number of records that were in the store, including any
    /// that had expired without being purged yet.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.expirations.clear();
        count
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
