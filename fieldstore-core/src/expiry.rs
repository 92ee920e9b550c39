use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_MAX_TTL;

/// Field name -> value for a single record
pub(crate) type Fields = HashMap<String, String>;

/// Record key -> fields
pub(crate) type Records = HashMap<String, Fields>;

/// Record key -> absolute expiration instant, only for records with a TTL
pub(crate) type Expirations = HashMap<String, Instant>;

/// Whether a record currently counts as existing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Present and either without a TTL or not yet past it
    Exists,
    /// Present but its TTL has elapsed; writers must purge it before use
    Expired,
    /// Not in the store at all
    Absent,
}

impl Liveness {
    /// Returns `true` for [`Liveness::Exists`]
    pub fn is_live(self) -> bool {
        matches!(self, Liveness::Exists)
    }
}

/// Resolves the liveness of `key` at `now`.
///
/// Every read and every keyed write goes through this before touching data, so
/// expired records are never returned and never silently kept.
pub(crate) fn resolve(
    records: &Records,
    expirations: &Expirations,
    key: &str,
    now: Instant,
) -> Liveness {
    if !records.contains_key(key) {
        return Liveness::Absent;
    }

    match expirations.get(key) {
        Some(&expires_at) if is_expired(expires_at, now) => Liveness::Expired,
        _ => Liveness::Exists,
    }
}

/// A record is live only while `now` is strictly before its expiration instant.
pub(crate) fn is_expired(expires_at: Instant, now: Instant) -> bool {
    now >= expires_at
}

/// Absolute expiration instant for a TTL of `seconds` counted from `now`.
///
/// Zero and negative TTLs yield `now`, which is already expired.
pub(crate) fn expiration_instant(now: Instant, seconds: i64, max_ttl: Duration) -> Instant {
    if seconds <= 0 {
        return now;
    }

    let ttl = Duration::from_secs(seconds.unsigned_abs()).min(max_ttl);
    now.checked_add(ttl).unwrap_or_else(|| now + DEFAULT_MAX_TTL)
}

/// Time left before `expires_at`, zero once it has passed.
pub(crate) fn remaining(expires_at: Instant, now: Instant) -> Duration {
    expires_at.saturating_duration_since(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records_with(key: &str) -> Records {
        let mut fields = Fields::new();
        fields.insert("field".to_string(), "value".to_string());
        let mut records = Records::new();
        records.insert(key.to_string(), fields);
        records
    }

    #[test]
    fn test_absent_key() {
        let now = Instant::now();
        let liveness = resolve(&Records::new(), &Expirations::new(), "missing", now);
        assert_eq!(liveness, Liveness::Absent);
        assert!(!liveness.is_live());
    }

    #[test]
    fn test_record_without_ttl_exists() {
        let now = Instant::now();
        let records = records_with("k");
        assert_eq!(resolve(&records, &Expirations::new(), "k", now), Liveness::Exists);
    }

    #[test]
    fn test_future_expiration_exists() {
        let now = Instant::now();
        let records = records_with("k");
        let mut expirations = Expirations::new();
        expirations.insert("k".to_string(), now + Duration::from_secs(60));

        assert_eq!(resolve(&records, &expirations, "k", now), Liveness::Exists);
    }

    #[test]
    fn test_expiration_instant_is_not_live() {
        let now = Instant::now();
        let records = records_with("k");
        let mut expirations = Expirations::new();
        expirations.insert("k".to_string(), now);

        // Expired exactly at the instant, not one tick later
        assert_eq!(resolve(&records, &expirations, "k", now), Liveness::Expired);
    }

    #[test]
    fn test_orphan_expiration_is_absent() {
        let now = Instant::now();
        let mut expirations = Expirations::new();
        expirations.insert("ghost".to_string(), now);

        assert_eq!(resolve(&Records::new(), &expirations, "ghost", now), Liveness::Absent);
    }

    #[test]
    fn test_non_positive_ttl_expires_now() {
        let now = Instant::now();
        assert_eq!(expiration_instant(now, 0, DEFAULT_MAX_TTL), now);
        assert_eq!(expiration_instant(now, -30, DEFAULT_MAX_TTL), now);
    }

    #[test]
    fn test_ttl_is_capped() {
        let now = Instant::now();
        let cap = Duration::from_secs(10);
        assert_eq!(expiration_instant(now, i64::MAX, cap), now + cap);
        assert_eq!(expiration_instant(now, 5, cap), now + Duration::from_secs(5));
    }

    #[test]
    fn test_remaining_saturates() {
        let now = Instant::now();
        assert_eq!(remaining(now, now + Duration::from_secs(5)), Duration::ZERO);
        assert_eq!(remaining(now + Duration::from_secs(5), now), Duration::from_secs(5));
    }
}
