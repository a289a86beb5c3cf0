//! Shared state for the webhook dispatcher's axum handlers.

use std::sync::Arc;

use pelu_common::services::{BoxedError, MessagingService};
use pelu_config::AppConfig;
use pelu_dialogue::DialogueEngine;
use pelu_kv::KvStore;
use tokio::sync::Semaphore;

/// Bounded worker pool size for dispatched engine calls — a fixed small
/// pool rather than an unbounded spawn per inbound message.
const WORKER_POOL_SIZE: usize = 16;

#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<AppConfig>,
    pub kv: Arc<dyn KvStore>,
    pub engine: Arc<DialogueEngine>,
    pub messaging: Option<Arc<dyn MessagingService<Error = BoxedError>>>,
    pub workers: Arc<Semaphore>,
}

impl WebhookState {
    pub fn new(
        config: Arc<AppConfig>,
        kv: Arc<dyn KvStore>,
        engine: Arc<DialogueEngine>,
        messaging: Option<Arc<dyn MessagingService<Error = BoxedError>>>,
    ) -> Self {
        Self {
            config,
            kv,
            engine,
            messaging,
            workers: Arc::new(Semaphore::new(WORKER_POOL_SIZE)),
        }
    }

    pub fn loopback_timeout(&self) -> std::time::Duration {
        let seconds = self
            .config
            .messaging
            .as_ref()
            .map(|m| m.loopback_timeout_seconds)
            .unwrap_or(40);
        std::time::Duration::from_secs(seconds)
    }
}
