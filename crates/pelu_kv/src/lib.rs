pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::KvError;
pub use memory::MemoryKv;
pub use redis_store::RedisKv;
pub use store::KvStore;

use pelu_config::{AppConfig, StorageBackend};
use std::sync::Arc;

/// Builds the configured `KvStore` implementation (`memory` or `redis`).
pub async fn build_kv_store(config: &AppConfig) -> Result<Arc<dyn KvStore>, KvError> {
    match config.kv.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryKv::new())),
        StorageBackend::Redis => {
            let url = config
                .kv
                .redis_url
                .as_deref()
                .ok_or_else(|| KvError::Unavailable("kv.redis_url not set".to_string()))?;
            let store = RedisKv::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}
