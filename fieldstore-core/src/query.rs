use std::fmt;
use std::time::{Duration, Instant};

use crate::expiry::{self, Fields};
use crate::store::Store;

impl Store {
    /// Fields of `key` if the record is live at `now`
    fn live_fields(&self, key: &str, now: Instant) -> Option<&Fields> {
        if self.liveness_at(key, now).is_live() {
            self.records.get(key)
        } else {
            None
        }
    }

    /// Live records at `now`, in store iteration order
    pub(crate) fn live_records(
        &self,
        now: Instant,
    ) -> impl Iterator<Item = (&String, &Fields)> + '_ {
        self.records
            .iter()
            .filter(move |(key, _)| self.liveness_at(key, now).is_live())
    }

    /// Returns the value of `field` on record `key`.
    ///
    /// Returns `None` if the record is absent or expired, or if it has no such
    /// field. An empty value is returned as `Some("")`.
    pub fn get(&self, key: &str, field: &str) -> Option<String> {
        self.live_fields(key, Instant::now())?.get(field).cloned()
    }

    /// Returns the field names of record `key`, sorted.
    ///
    /// Empty if the record is absent or expired.
    pub fn get_fields(&self, key: &str) -> Vec<String> {
        let mut fields: Vec<String> = self
            .live_fields(key, Instant::now())
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    /// Checks if record `key` exists and has not expired.
    #[must_use]
    pub fn has_record(&self, key: &str) -> bool {
        self.liveness(key).is_live()
    }

    /// Returns the keys of all live records, sorted.
    pub fn get_all_record_ids(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .live_records(Instant::now())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the keys of live records whose `field` equals `value`, sorted.
    ///
    /// Matching is exact and case-sensitive.
    ///
    /// # Performance
    ///
    /// There is no secondary index: every call scans the whole store.
    pub fn get_records_by_field_value(&self, field: &str, value: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .live_records(Instant::now())
            .filter(|(_, fields)| fields.get(field).is_some_and(|v| v == value))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the time left before record `key` expires.
    ///
    /// `None` if the record is not live or has no TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        if !self.liveness_at(key, now).is_live() {
            return None;
        }
        let expires_at = *self.expirations.get(key)?;
        Some(expiry::remaining(expires_at, now))
    }

    /// Returns the number of live records
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_records(Instant::now()).count()
    }

    /// Returns `true` if no record is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_records(Instant::now()).next().is_none()
    }
}

/// Human-readable dump of the live records, sorted by key then field.
impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Instant::now();
        let mut records: Vec<(&String, &Fields)> = self.live_records(now).collect();
        if records.is_empty() {
            return writeln!(f, "Store is empty.");
        }
        records.sort_by(|a, b| a.0.cmp(b.0));

        for (key, fields) in records {
            writeln!(f, "Record: {}", key)?;

            let mut fields: Vec<(&String, &String)> = fields.iter().collect();
            fields.sort();
            for (field, value) in fields {
                writeln!(f, "  {} = {}", field, value)?;
            }

            if let Some(&expires_at) = self.expirations.get(key.as_str()) {
                let secs = expiry::remaining(expires_at, now).as_secs();
                writeln!(f, "  [TTL: {} seconds remaining]", secs)?;
            }
        }
        Ok(())
    }
}
