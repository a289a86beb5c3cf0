use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("kv backend unavailable: {0}")]
    Unavailable(String),
}
