use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{loopback_handler, whatsapp_receive_handler, whatsapp_verify_handler};
use crate::state::WebhookState;

/// Builds the router for both inbound surfaces, sharing one `WebhookState`.
pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(whatsapp_verify_handler).post(whatsapp_receive_handler))
        .route("/webhook", post(loopback_handler))
        .with_state(state)
}
