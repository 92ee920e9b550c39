//! # Fieldstore Core
//!
//! An embedded key-field-value store with TTL support.
//!
//! ## Features
//!
//! - Records keyed by string, each holding string fields
//! - Per-record time-to-live on a monotonic clock
//! - Lazy expiration: expired records are masked on read and purged on write,
//!   with [`Store::expire_sweep`] to purge eagerly
//! - Exact-match filtering on a field value
//! - Line-oriented text backups with all-or-nothing restore
//!
//! ## Example
//!
//! ```rust
//! use fieldstore_core::Store;
//!
//! let mut store = Store::new();
//! store.set("session:1", "user", "alice");
//! store.set("session:1", "status", "active");
//! store.set_ttl("session:1", 60);
//!
//! let active = store.get_records_by_field_value("status", "active");
//! assert_eq!(active, vec!["session:1"]);
//!
//! let backup = store.backup();
//! let mut copy = Store::new();
//! copy.restore(&backup).unwrap();
//! assert_eq!(copy.get("session:1", "user"), Some("alice".to_string()));
//!
//! // Nothing has expired yet
//! assert_eq!(store.expire_sweep(), 0);
//! ```

mod backup;
mod config;
mod error;
mod expiry;
mod query;
mod store;

pub use config::{StoreConfig, DEFAULT_MAX_TTL};
pub use error::RestoreError;
pub use expiry::Liveness;
pub use store::Store;
