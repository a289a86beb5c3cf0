use axum::{extract::State, routing::get, Json, Router};
use pelu_common::logging;
use pelu_config::load_config;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

mod app_state;
mod service_factory;

use app_state::AppState;

#[axum::debug_handler]
async fn healthz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let db_ok = state.db.is_healthy().await;
    let status = if db_ok { "ok" } else { "degraded" };
    Json(json!({ "status": status, "db": db_ok }))
}

#[tokio::main]
async fn main() {
    logging::init_logging("pelu-backend").expect("failed to initialize logging");

    info!("Starting pelu-backend service");

    let config = Arc::new(load_config().expect("failed to load config"));
    info!("configuration loaded for {} shop(s)", config.shops.len());

    let app_state = Arc::new(
        AppState::new(config.clone())
            .await
            .expect("failed to initialize application state"),
    );

    let webhook_state = Arc::new(pelu_webhook::WebhookState::new(
        config.clone(),
        app_state.kv.clone(),
        app_state.engine.clone(),
        app_state.service_factory.messaging_service(),
    ));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .with_state(app_state.clone())
        .merge(pelu_webhook::routes(webhook_state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await.unwrap();
}
