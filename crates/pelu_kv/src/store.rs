use crate::error::KvError;
use async_trait::async_trait;

/// A small key-value abstraction for session state, idempotency caches,
/// dedupe keys, rate-limit counters, and pagination snapshots.
///
/// All values are opaque strings (callers serialize/deserialize JSON
/// themselves); TTLs are the only structure the store imposes.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Sets `key` to `value`, expiring after `ttl_seconds`.
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), KvError>;

    /// Atomically increments `key` (creating it at 1 if absent) and ensures
    /// it expires after `ttl_seconds` from its first increment. Returns the
    /// new value.
    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<i64, KvError>;

    /// Atomically sets `key` to `value` with a `ttl_seconds` expiry only if
    /// `key` does not already hold an unexpired value. Returns `true` if the
    /// set happened (lock acquired), `false` if `key` was already held.
    async fn set_nx(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<bool, KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;
}
