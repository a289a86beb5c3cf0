use axum::{routing::get, Router};

/// Common routes shared across the application. Currently just a liveness
/// probe; the real /healthz (with DB/KV reachability) lives in the backend
/// service, which has access to those clients.
pub fn routes() -> Router {
    Router::new().route("/ping", get(|| async { "pong" }))
}
