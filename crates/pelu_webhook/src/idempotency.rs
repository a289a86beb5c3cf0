//! Request-level idempotency cache for the loopback endpoint: a cached
//! response under `idemp:<sha256(key)>` replayed verbatim within TTL,
//! independent of whatever side effects the first call had.

use pelu_kv::KvStore;
use sha2::{Digest, Sha256};

const IDEMPOTENCY_TTL_SECONDS: u64 = 24 * 3600;

fn cache_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    format!("idemp:{}", hex::encode(hasher.finalize()))
}

pub async fn get_cached(kv: &dyn KvStore, idempotency_key: &str) -> Option<String> {
    kv.get(&cache_key(idempotency_key)).await.ok().flatten()
}

pub async fn store(kv: &dyn KvStore, idempotency_key: &str, body: &str) {
    let key = cache_key(idempotency_key);
    if let Err(e) = kv.setex(&key, IDEMPOTENCY_TTL_SECONDS, body).await {
        tracing::warn!(error = %e, "failed to persist idempotency cache entry");
    }
}
