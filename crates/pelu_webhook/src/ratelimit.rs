//! Per-tenant rate limiting, inbound dedupe, and the monotonic-`ts` ordering
//! filter — all three are plain counters/markers keyed by session or shop.

use pelu_kv::KvStore;

const SEEN_WAMID_TTL_SECONDS: u64 = 24 * 3600;
const LAST_TS_TTL_SECONDS: u64 = 24 * 3600;
const MINUTE: i64 = 60;

/// `true` iff the per-minute bucket for `shop_id` is still under `limit`.
/// Storage failures fail open — a KV outage must not silently blackout a
/// shop's inbound traffic.
pub async fn check_inbound_rate(kv: &dyn KvStore, shop_id: i64, limit: u32, now_unix: i64) -> bool {
    let bucket = now_unix / MINUTE;
    let key = format!("rl:wa:in:{shop_id}:{bucket}");
    match kv.incr(&key, 70).await {
        Ok(count) => count <= limit as i64,
        Err(e) => {
            tracing::warn!(shop_id, error = %e, "rate-limit counter unavailable, failing open");
            true
        }
    }
}

/// `true` iff the outbound per-minute bucket for `shop_id` is still under
/// `limit`. Overage is dropped silently by the caller.
pub async fn check_outbound_rate(kv: &dyn KvStore, shop_id: i64, limit: u32, now_unix: i64) -> bool {
    let bucket = now_unix / MINUTE;
    let key = format!("rl:wa:out:{shop_id}:{bucket}");
    match kv.incr(&key, 70).await {
        Ok(count) => count <= limit as i64,
        Err(e) => {
            tracing::warn!(shop_id, error = %e, "outbound rate-limit counter unavailable, failing open");
            true
        }
    }
}

/// `true` if `message_id` has not been seen before (and marks it seen).
pub async fn first_time_seen(kv: &dyn KvStore, message_id: &str) -> bool {
    let key = format!("seen_wamid:{message_id}");
    match kv.get(&key).await {
        Ok(Some(_)) => false,
        Ok(None) => {
            if let Err(e) = kv.setex(&key, SEEN_WAMID_TTL_SECONDS, "1").await {
                tracing::warn!(message_id, error = %e, "failed to record message dedupe marker");
            }
            true
        }
        Err(e) => {
            tracing::warn!(message_id, error = %e, "dedupe lookup failed, treating as unseen");
            true
        }
    }
}

/// `true` iff `ts` is strictly greater than the last-seen timestamp for
/// `session_id` (and advances the marker). Equal or earlier is a stale
/// retransmit or a race with a previously processed message.
pub async fn is_monotonic(kv: &dyn KvStore, session_id: &str, ts: i64) -> bool {
    let key = format!("last_ts:{session_id}");
    let last_seen = match kv.get(&key).await {
        Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(i64::MIN),
        _ => i64::MIN,
    };
    if ts <= last_seen {
        return false;
    }
    if let Err(e) = kv.setex(&key, LAST_TS_TTL_SECONDS, &ts.to_string()).await {
        tracing::warn!(session_id, error = %e, "failed to advance monotonic ts marker");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pelu_kv::MemoryKv;

    #[tokio::test]
    async fn monotonic_filter_rejects_stale_and_duplicate_ts() {
        let kv = MemoryKv::new();
        assert!(is_monotonic(&kv, "wa_1", 100).await);
        assert!(!is_monotonic(&kv, "wa_1", 100).await);
        assert!(!is_monotonic(&kv, "wa_1", 50).await);
        assert!(is_monotonic(&kv, "wa_1", 150).await);
    }

    #[tokio::test]
    async fn dedupe_marker_fires_once() {
        let kv = MemoryKv::new();
        assert!(first_time_seen(&kv, "wamid-1").await);
        assert!(!first_time_seen(&kv, "wamid-1").await);
    }

    #[tokio::test]
    async fn rate_limit_trips_after_the_configured_count() {
        let kv = MemoryKv::new();
        assert!(check_inbound_rate(&kv, 1, 2, 0).await);
        assert!(check_inbound_rate(&kv, 1, 2, 0).await);
        assert!(!check_inbound_rate(&kv, 1, 2, 0).await);
    }
}
