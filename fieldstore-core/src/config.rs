use std::time::Duration;

/// Longest TTL the store will arm (~100 years).
///
/// Adding a larger duration to an `Instant` can overflow, so positive TTLs are
/// clamped to this value.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Configuration for a [`Store`](crate::Store)
///
/// # Example
///
/// ```rust
/// use fieldstore_core::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_max_ttl(Duration::from_secs(24 * 60 * 60))
///     .with_initial_capacity(1024);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound applied to positive TTLs (default: ~100 years)
    pub max_ttl: Duration,
    /// Number of records to reserve space for up front (default: 0)
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            initial_capacity: 0,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest TTL `set_ttl` will arm
    ///
    /// Requests above the cap are clamped, not rejected.
    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    /// Reserves room for `capacity` records when the store is created
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
