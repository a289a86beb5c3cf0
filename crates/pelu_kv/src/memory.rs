use crate::error::KvError;
use crate::store::KvStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store for single-instance deployments and tests. Expired
/// entries are reaped lazily on access, same as the original's dict-based
/// backend.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<i64, KvError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let next = match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                entry.value.parse::<i64>().unwrap_or(0) + 1
            }
            _ => 1,
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: now + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(next)
    }

    async fn set_nx(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn setex_then_get_roundtrips() {
        let kv = MemoryKv::new();
        kv.setex("a", 60, "1").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let kv = MemoryKv::new();
        kv.setex("a", 0, "1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_starts_at_one_and_accumulates() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("n", 60).await.unwrap(), 1);
        assert_eq!(kv.incr("n", 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let kv = MemoryKv::new();
        kv.setex("a", 60, "1").await.unwrap();
        kv.delete("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_only_succeeds_once_while_held() {
        let kv = MemoryKv::new();
        assert!(kv.set_nx("lock:a", 60, "1").await.unwrap());
        assert!(!kv.set_nx("lock:a", 60, "2").await.unwrap());
    }

    #[tokio::test]
    async fn set_nx_succeeds_again_after_expiry() {
        let kv = MemoryKv::new();
        assert!(kv.set_nx("lock:a", 0, "1").await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(kv.set_nx("lock:a", 60, "2").await.unwrap());
    }
}
