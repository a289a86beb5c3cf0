//! Axum handlers for the two inbound surfaces: the messaging transport
//! webhook (`GET`/`POST /webhook/whatsapp`) and the loopback core API
//! (`POST /webhook`).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use pelu_dialogue::{Choice, HandleResult, Origin, UiDirective};
use pelu_messaging::envelope::{
    extract_messages, idempotency_key, verify_signature, verify_subscription, MessageOrigin,
};

use crate::dispatch::dispatch;
use crate::idempotency;
use crate::ratelimit::{check_inbound_rate, check_outbound_rate, first_time_seen, is_monotonic};
use crate::state::WebhookState;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub async fn whatsapp_verify_handler(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected_token = state.config.messaging.as_ref().map(|m| m.verify_token.as_str()).unwrap_or("");
    let mode = params.mode.unwrap_or_default();
    let token = params.verify_token.unwrap_or_default();
    let challenge = params.challenge.unwrap_or_default();

    match verify_subscription(&mode, &token, &challenge, expected_token) {
        Some(echoed) => (StatusCode::OK, echoed).into_response(),
        None => StatusCode::FORBIDDEN.into_response(),
    }
}

pub async fn whatsapp_receive_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(messaging_config) = state.config.messaging.as_ref() else {
        return StatusCode::FORBIDDEN.into_response();
    };

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(&messaging_config.app_secret, &body, signature) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let messages = match extract_messages(&body) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse inbound WhatsApp envelope");
            return StatusCode::OK.into_response();
        }
    };

    for message in messages {
        let Some(shop) = state.config.shop_by_phone_number_id(&message.phone_number_id).cloned() else {
            tracing::warn!(phone_number_id = %message.phone_number_id, "inbound message for unknown phone_number_id");
            continue;
        };

        let now = chrono::Utc::now().timestamp();
        if !check_inbound_rate(state.kv.as_ref(), shop.id, messaging_config.webhook_rate_per_minute, now).await {
            tracing::warn!(shop_id = shop.id, "webhook rate limit exceeded");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
        if !is_monotonic(state.kv.as_ref(), &message.session_id, message.timestamp).await {
            continue;
        }
        if !first_time_seen(state.kv.as_ref(), &message.message_id).await {
            continue;
        }

        let origin = match message.origin {
            MessageOrigin::Text => Origin::Text,
            MessageOrigin::Button => Origin::Button,
            MessageOrigin::List => Origin::List,
        };

        let state = state.clone();
        let Ok(permit) = state.workers.clone().acquire_owned().await else {
            continue;
        };
        tokio::spawn(async move {
            let _permit = permit;
            let timeout = state.loopback_timeout();
            let result = tokio::time::timeout(
                timeout,
                dispatch(&state.engine, state.kv.as_ref(), &shop, &message.session_id, &message.payload, origin),
            )
            .await;

            match result {
                Ok(reply) => send_outbound(&state, &shop, &message.session_id, &message.phone_number_id, reply).await,
                Err(_) => {
                    tracing::warn!(session_id = %message.session_id, "engine call exceeded loopback timeout");
                }
            }
        });
    }

    StatusCode::OK.into_response()
}

async fn send_outbound(state: &WebhookState, shop: &pelu_config::ShopConfig, session_id: &str, phone_number_id: &str, reply: HandleResult) {
    let Some(messaging) = state.messaging.as_ref() else { return };
    let limit = state.config.messaging.as_ref().map(|m| m.outbound_rate_per_minute).unwrap_or(100);
    let now = chrono::Utc::now().timestamp();
    if !check_outbound_rate(state.kv.as_ref(), shop.id, limit, now).await {
        tracing::warn!(shop_id = shop.id, "outbound rate limit exceeded, dropping reply");
        return;
    }

    let to = session_id.trim_start_matches("wa_");
    let idem_payload = json!({ "reply_text": reply.reply_text, "choices": reply.choices.as_ref().map(|c| c.len()) });
    let idem_key = idempotency_key(session_id, &idem_payload);

    let send_result = match reply.choices {
        Some(choices) if !choices.is_empty() => {
            let options: Vec<(String, String)> = choices.into_iter().map(|c: Choice| (c.id, c.label)).collect();
            messaging.send_menu(to, phone_number_id, &reply.reply_text, options, &idem_key).await
        }
        _ => messaging.send_text(to, phone_number_id, &reply.reply_text, &idem_key).await,
    };

    if let Err(e) = send_result {
        tracing::warn!(session_id, error = %e, "failed to send outbound WhatsApp message");
    }

    if let Some(secondary) = reply.secondary_text {
        let idem_key2 = idempotency_key(session_id, &json!({ "secondary": secondary }));
        if let Err(e) = messaging.send_text(to, phone_number_id, &secondary, &idem_key2).await {
            tracing::warn!(session_id, error = %e, "failed to send secondary outbound message");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoopbackRequest {
    pub session_id: String,
    pub mensaje: String,
    pub origin: String,
}

#[derive(Debug, Serialize)]
pub struct LoopbackResponse {
    pub respuesta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respuesta2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl From<HandleResult> for LoopbackResponse {
    fn from(r: HandleResult) -> Self {
        LoopbackResponse { respuesta: r.reply_text, respuesta2: r.secondary_text, ui: r.ui, choices: r.choices }
    }
}

fn is_valid_session_id(s: &str) -> bool {
    (4..=40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub async fn loopback_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    Json(request): Json<LoopbackRequest>,
) -> Response {
    let api_key = headers.get("X-API-KEY").and_then(|v| v.to_str().ok()).unwrap_or("");
    let Some(shop) = state.config.shop_by_api_key(api_key).cloned() else {
        return StatusCode::FORBIDDEN.into_response();
    };

    if !is_valid_session_id(&request.session_id) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid session_id" }))).into_response();
    }

    let origin = match request.origin.as_str() {
        "text" => Origin::Text,
        "button" => Origin::Button,
        "list" => Origin::List,
        _ => return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid origin" }))).into_response(),
    };

    let idempotency_header = headers.get("Idempotency-Key").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    if let Some(key) = &idempotency_header {
        let full_key = format!("{}:{}", shop.api_key, key);
        if let Some(cached) = idempotency::get_cached(state.kv.as_ref(), &full_key).await {
            return (
                StatusCode::OK,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                cached,
            )
                .into_response();
        }
    }

    let reply = dispatch(&state.engine, state.kv.as_ref(), &shop, &request.session_id, &request.mensaje, origin).await;
    let response = LoopbackResponse::from(reply);
    let body = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());

    if let Some(key) = &idempotency_header {
        let full_key = format!("{}:{}", shop.api_key, key);
        idempotency::store(state.kv.as_ref(), &full_key, &body).await;
    }

    (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response()
}
