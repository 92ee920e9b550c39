//! Line-oriented backup format.
//!
//! ```text
//! <live record count>
//! <key>            \
//! <field count>     | repeated per record
//! <field>          |
//! <value>          /  (field/value repeated per field)
//! <ttl count>
//! <key>            \  repeated per TTL
//! <remaining secs> /
//! ```
//!
//! Every token sits on its own line. Keys, fields and values are escaped so
//! that they can never span lines: `\` becomes `\\`, a newline becomes `\n`
//! and a carriage return becomes `\r`. Tokens without those characters are
//! written verbatim.

use std::str::Lines;
use std::time::{Duration, Instant};

use crate::error::RestoreError;
use crate::expiry::{self, Expirations, Fields, Records};
use crate::store::Store;

/// Records and relative TTLs read from a backup, not yet installed.
#[derive(Debug, Default)]
struct Snapshot {
    records: Records,
    ttls: Vec<(String, i64)>,
}

impl Store {
    /// Serializes every live record and its remaining TTL.
    ///
    /// Records are written in store iteration order. Every TTL with time left is
    /// written as whole seconds remaining, rounded down, so a record with less
    /// than a second left is written with `0` and restores as already expired.
    /// Restoring later shifts each deadline forward by the time in between.
    pub fn backup(&self) -> String {
        let now = Instant::now();
        let live: Vec<(&String, &Fields)> = self.live_records(now).collect();
        let mut out = String::new();

        push_line(&mut out, &live.len().to_string());
        for (key, fields) in &live {
            push_line(&mut out, &escape(key));
            push_line(&mut out, &fields.len().to_string());
            for (field, value) in fields.iter() {
                push_line(&mut out, &escape(field));
                push_line(&mut out, &escape(value));
            }
        }

        let ttls: Vec<(&String, u64)> = live
            .iter()
            .filter_map(|(key, _)| {
                let expires_at = *self.expirations.get(key.as_str())?;
                let left = expiry::remaining(expires_at, now);
                (left > Duration::ZERO).then_some((*key, left.as_secs()))
            })
            .collect();

        push_line(&mut out, &ttls.len().to_string());
        for (key, secs) in ttls {
            push_line(&mut out, &escape(key));
            push_line(&mut out, &secs.to_string());
        }

        tracing::debug!("Backed up {} records", live.len());
        out
    }

    /// Replaces the whole store with the contents of a backup.
    ///
    /// Restored TTLs count from now. Restoring is all-or-nothing: on error the
    /// store is left empty, never partially populated.
    pub fn restore(&mut self, data: &str) -> Result<(), RestoreError> {
        let snapshot = match decode(data) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.clear();
                tracing::warn!("Restore failed, store cleared: {}", err);
                return Err(err);
            }
        };

        let now = Instant::now();
        let mut expirations = Expirations::with_capacity(snapshot.ttls.len());
        for (key, secs) in snapshot.ttls {
            expirations.insert(key, expiry::expiration_instant(now, secs, self.max_ttl));
        }

        tracing::debug!(
            "Restored {} records ({} with TTL)",
            snapshot.records.len(),
            expirations.len()
        );
        self.records = snapshot.records;
        self.expirations = expirations;
        Ok(())
    }
}

fn push_line(out: &mut String, token: &str) {
    out.push_str(token);
    out.push('\n');
}

fn escape(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape(token: &str, line: usize) -> Result<String, RestoreError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            _ => return Err(RestoreError::InvalidEscape { line }),
        }
    }
    Ok(out)
}

/// Cursor over backup lines that tracks the current line number.
struct Reader<'a> {
    lines: Lines<'a>,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a str) -> Self {
        Self { lines: data.lines(), line: 0 }
    }

    fn next_line(&mut self, expected: &'static str) -> Result<&'a str, RestoreError> {
        self.line += 1;
        self.lines.next().ok_or(RestoreError::MissingLine {
            expected,
            line: self.line,
        })
    }

    fn next_token(&mut self, expected: &'static str) -> Result<String, RestoreError> {
        let raw = self.next_line(expected)?;
        unescape(raw, self.line)
    }

    fn next_count(&mut self, expected: &'static str) -> Result<usize, RestoreError> {
        let raw = self.next_line(expected)?;
        raw.parse().map_err(|_| RestoreError::InvalidCount {
            line: self.line,
            value: raw.to_string(),
        })
    }

    fn next_seconds(&mut self) -> Result<i64, RestoreError> {
        let raw = self.next_line("TTL seconds")?;
        raw.parse().map_err(|_| RestoreError::InvalidSeconds {
            line: self.line,
            value: raw.to_string(),
        })
    }
}

// Anything after the TTL section is ignored.
fn decode(data: &str) -> Result<Snapshot, RestoreError> {
    let mut reader = Reader::new(data);
    let mut snapshot = Snapshot::default();

    let record_count = reader.next_count("record count")?;
    for _ in 0..record_count {
        let key = reader.next_token("record key")?;
        let field_count = reader.next_count("field count")?;
        for _ in 0..field_count {
            let field = reader.next_token("field name")?;
            let value = reader.next_token("field value")?;
            snapshot
                .records
                .entry(key.clone())
                .or_default()
                .insert(field, value);
        }
    }

    let ttl_count = reader.next_count("TTL count")?;
    for _ in 0..ttl_count {
        let key = reader.next_token("TTL key")?;
        let key_line = reader.line;
        let secs = reader.next_seconds()?;
        if !snapshot.records.contains_key(&key) {
            return Err(RestoreError::UnknownTtlKey {
                line: key_line,
                key,
            });
        }
        snapshot.ttls.push((key, secs));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample_store() -> Store {
        let mut store = Store::new();
        store.set("user_001", "name", "Alice Johnson");
        store.set("user_001", "department", "Engineering");
        store.set("user_002", "name", "Bob Smith");
        store.set("user_002", "nickname", "");
        store.set("session_001", "status", "active");
        store.set_ttl("session_001", 120);
        store
    }

    fn assert_same_live_state(a: &Store, b: &Store) {
        let ids = a.get_all_record_ids();
        assert_eq!(ids, b.get_all_record_ids());
        for id in &ids {
            let fields = a.get_fields(id);
            assert_eq!(fields, b.get_fields(id));
            for field in &fields {
                assert_eq!(a.get(id, field), b.get(id, field));
            }
        }
    }

    #[test]
    fn test_backup_format() {
        let mut store = Store::new();
        store.set("k", "f", "v");
        store.set_ttl("k", 100);

        let backup = store.backup();
        let lines: Vec<&str> = backup.lines().collect();
        assert_eq!(&lines[..4], &["1", "k", "1", "f"]);
        assert_eq!(lines[4], "v");
        assert_eq!(lines[5], "1");
        assert_eq!(lines[6], "k");
        let secs: u64 = lines[7].parse().unwrap();
        assert!(secs == 99 || secs == 100);
        assert!(backup.ends_with('\n'));
    }

    #[test]
    fn test_sub_second_ttl_survives_round_trip() {
        let mut store = Store::new();
        store.set("s", "x", "1");
        store.set_ttl("s", 60);
        store
            .expirations
            .insert("s".to_string(), Instant::now() + Duration::from_millis(500));

        let backup = store.backup();
        assert_eq!(backup, "1\ns\n1\nx\n1\n1\ns\n0\n");

        let mut restored = Store::new();
        restored.restore(&backup).unwrap();
        thread::sleep(Duration::from_millis(700));

        assert!(!store.has_record("s"));
        assert!(!restored.has_record("s"));
        assert_eq!(restored.expire_sweep(), 1);
    }

    #[test]
    fn test_empty_store_backup() {
        let store = Store::new();
        assert_eq!(store.backup(), "0\n0\n");
    }

    #[test]
    fn test_round_trip() {
        let store = sample_store();
        let backup = store.backup();

        let mut restored = Store::new();
        restored.set("stale", "x", "1");
        restored.restore(&backup).unwrap();

        assert_same_live_state(&store, &restored);
        assert!(!restored.has_record("stale"));
        let ttl = restored.ttl("session_001").unwrap();
        assert!(ttl > Duration::from_secs(118) && ttl <= Duration::from_secs(120));
        assert_eq!(restored.ttl("user_001"), None);
    }

    #[test]
    fn test_backup_excludes_expired_records_and_ttls() {
        let mut store = sample_store();
        store.set("gone", "x", "1");
        store.set_ttl("gone", 0);

        let backup = store.backup();
        assert!(!backup.lines().any(|line| line == "gone"));

        let mut restored = Store::new();
        restored.restore(&backup).unwrap();
        assert_eq!(restored.len(), 3);
        assert!(!restored.has_record("gone"));
    }

    #[test]
    fn test_round_trip_escapes_line_breaks() {
        let mut store = Store::new();
        store.set("multi\nline", "note", "first\nsecond\r\n");
        store.set("slashes", "path", "C:\\temp\\n");
        store.set_ttl("multi\nline", 60);

        let backup = store.backup();
        assert!(backup.contains("multi\\nline\n"));
        assert!(backup.contains("C:\\\\temp\\\\n\n"));

        let mut restored = Store::new();
        restored.restore(&backup).unwrap();
        assert_eq!(
            restored.get("multi\nline", "note"),
            Some("first\nsecond\r\n".to_string())
        );
        assert_eq!(restored.get("slashes", "path"), Some("C:\\temp\\n".to_string()));
        assert!(restored.ttl("multi\nline").is_some());
    }

    #[test]
    fn test_restore_plain_hand_written_backup() {
        let data = "2\nuser1\n2\nname\nAlice\nage\n25\nuser2\n1\nname\nBob\n1\nuser2\n30\n";
        let mut store = Store::new();
        store.restore(data).unwrap();

        assert_eq!(store.get_all_record_ids(), vec!["user1", "user2"]);
        assert_eq!(store.get_fields("user1"), vec!["age", "name"]);
        assert_eq!(store.get("user2", "name"), Some("Bob".to_string()));
        assert!(store.ttl("user2").unwrap() <= Duration::from_secs(30));
        assert_eq!(store.ttl("user1"), None);
    }

    #[test]
    fn test_restore_non_positive_seconds_is_expired() {
        let data = "1\nk\n1\nf\nv\n1\nk\n0\n";
        let mut store = Store::new();
        store.restore(data).unwrap();

        assert!(!store.has_record("k"));
        assert_eq!(store.expire_sweep(), 1);
    }

    #[test]
    fn test_restore_skips_records_without_fields() {
        let data = "2\nempty\n0\nfull\n1\nf\nv\n0\n";
        let mut store = Store::new();
        store.restore(data).unwrap();

        assert_eq!(store.get_all_record_ids(), vec!["full"]);
    }

    #[test]
    fn test_restore_ignores_trailing_lines() {
        let mut store = Store::new();
        store.restore("1\nk\n1\nf\nv\n0\nleftover\n").unwrap();
        assert!(store.has_record("k"));
    }

    #[test]
    fn test_restore_garbage_clears_store() {
        let mut store = sample_store();
        let err = store.restore("garbage").unwrap_err();

        assert_eq!(
            err,
            RestoreError::InvalidCount {
                line: 1,
                value: "garbage".to_string()
            }
        );
        assert!(store.is_empty());
        assert!(store.records.is_empty());
        assert!(store.expirations.is_empty());
    }

    #[test]
    fn test_restore_empty_input_fails() {
        let mut store = sample_store();
        let err = store.restore("").unwrap_err();
        assert_eq!(
            err,
            RestoreError::MissingLine {
                expected: "record count",
                line: 1
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_truncated_is_atomic() {
        let backup = sample_store().backup();
        let truncated: String = backup.lines().take(6).map(|l| format!("{}\n", l)).collect();

        let mut store = Store::new();
        store.set("keep", "me", "please");
        assert!(matches!(
            store.restore(&truncated),
            Err(RestoreError::MissingLine { .. })
        ));
        assert!(store.records.is_empty());
    }

    #[test]
    fn test_restore_rejects_negative_count() {
        let mut store = Store::new();
        assert!(matches!(
            store.restore("-1\n0\n"),
            Err(RestoreError::InvalidCount { line: 1, .. })
        ));
    }

    #[test]
    fn test_restore_rejects_bad_seconds() {
        let mut store = Store::new();
        assert_eq!(
            store.restore("1\nk\n1\nf\nv\n1\nk\nsoon\n"),
            Err(RestoreError::InvalidSeconds {
                line: 8,
                value: "soon".to_string()
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_rejects_ttl_for_unknown_record() {
        let mut store = Store::new();
        assert_eq!(
            store.restore("0\n1\nghost\n10\n"),
            Err(RestoreError::UnknownTtlKey {
                line: 3,
                key: "ghost".to_string()
            })
        );
        assert!(store.expirations.is_empty());
    }

    #[test]
    fn test_restore_rejects_bad_escape() {
        let mut store = Store::new();
        assert_eq!(
            store.restore("1\nbad\\x\n1\nf\nv\n0\n"),
            Err(RestoreError::InvalidEscape { line: 2 })
        );
    }
}
