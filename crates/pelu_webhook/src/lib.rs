//! Webhook dispatcher (C9): the messaging transport's `GET`/`POST
//! /webhook/whatsapp` and the loopback core API's `POST /webhook`, plus the
//! rate limiting, dedupe, and list-reply pagination glue that sits in
//! front of the dialogue engine.

pub mod classify;
pub mod dispatch;
pub mod handlers;
pub mod idempotency;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use routes::routes;
pub use state::WebhookState;
