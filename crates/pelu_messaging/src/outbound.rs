//! Outbound send against the WhatsApp Business Cloud API.

use std::collections::HashMap;

use pelu_common::services::{BoxFuture, BoxedError, MessagingService, NotificationResult};
use pelu_config::AppConfig;
use reqwest::Client;
use serde_json::json;

use crate::error::MessagingError;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Sends text messages and interactive list/button menus, one outbound
/// access token per shop (`wa_phone_number_id` -> `wa_token`).
pub struct WhatsAppMessagingService {
    client: Client,
    tokens_by_phone_number_id: HashMap<String, String>,
    api_base: String,
}

impl WhatsAppMessagingService {
    pub fn new(config: &AppConfig) -> Self {
        let tokens_by_phone_number_id = config
            .shops
            .iter()
            .map(|s| (s.wa_phone_number_id.clone(), s.wa_token.clone()))
            .collect();
        Self {
            client: Client::new(),
            tokens_by_phone_number_id,
            api_base: GRAPH_API_BASE.to_string(),
        }
    }

    fn token_for(&self, phone_number_id: &str) -> Result<&str, MessagingError> {
        self.tokens_by_phone_number_id
            .get(phone_number_id)
            .map(|s| s.as_str())
            .ok_or_else(|| MessagingError::UnknownPhoneNumberId(phone_number_id.to_string()))
    }

    async fn send(
        &self,
        phone_number_id: &str,
        body: serde_json::Value,
        idempotency_key: &str,
    ) -> Result<NotificationResult, MessagingError> {
        let token = self.token_for(phone_number_id)?;
        let url = format!("{}/{}/messages", self.api_base, phone_number_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MessagingError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: serde_json::Value = response.json().await?;
        let message_id = parsed["messages"][0]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(NotificationResult {
            id: message_id,
            status: "sent".to_string(),
        })
    }
}

impl MessagingService for WhatsAppMessagingService {
    type Error = BoxedError;

    fn send_text(
        &self,
        to: &str,
        phone_number_id: &str,
        body: &str,
        idempotency_key: &str,
    ) -> BoxFuture<'_, NotificationResult, Self::Error> {
        let to = to.to_string();
        let body = body.to_string();
        let idempotency_key = idempotency_key.to_string();
        let phone_number_id = phone_number_id.to_string();
        Box::pin(async move {
            let payload = json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            });
            self.send(&phone_number_id, payload, &idempotency_key)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }

    fn send_menu(
        &self,
        to: &str,
        phone_number_id: &str,
        body: &str,
        options: Vec<(String, String)>,
        idempotency_key: &str,
    ) -> BoxFuture<'_, NotificationResult, Self::Error> {
        let to = to.to_string();
        let body = body.to_string();
        let idempotency_key = idempotency_key.to_string();
        let phone_number_id = phone_number_id.to_string();
        Box::pin(async move {
            let rows: Vec<_> = options
                .iter()
                .map(|(id, title)| json!({ "id": id, "title": title }))
                .collect();
            let payload = json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "interactive",
                "interactive": {
                    "type": "list",
                    "body": { "text": body },
                    "action": {
                        "button": "Elegir",
                        "sections": [{ "title": "Opciones", "rows": rows }],
                    },
                },
            });
            self.send(&phone_number_id, payload, &idempotency_key)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_for_unknown_phone_number_id_errors() {
        let config = AppConfig::default();
        let service = WhatsAppMessagingService::new(&config);
        assert!(matches!(
            service.token_for("missing"),
            Err(MessagingError::UnknownPhoneNumberId(_))
        ));
    }
}
