//! HTTP-backed implementation of `pelu_common::services::NlpService`.
//!
//! The interpreter itself (prompting, model choice) lives behind the
//! configured endpoint and is out of scope here; this crate only owns the
//! wire contract and the sentinel-to-`None` translation.

use pelu_common::services::{BoxFuture, BoxedError, NlpService};
use pelu_config::NlpConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::NlpError;

/// The interpreter signals "could not extract a value" with this literal,
/// mirroring the upstream prompt contract rather than an HTTP error code —
/// a 200 with this body is a normal, expected outcome.
const NO_UNDERSTAND_SENTINEL: &str = "NO_ENTIENDO";

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    slot_kind: &'a str,
    context: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    value: Option<String>,
}

pub struct HttpNlpInterpreter {
    client: Client,
    endpoint_url: String,
    api_key: Option<String>,
}

impl HttpNlpInterpreter {
    pub fn new(config: &NlpConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl NlpService for HttpNlpInterpreter {
    type Error = BoxedError;

    fn extract(
        &self,
        text: &str,
        slot_kind: &str,
        context: serde_json::Value,
    ) -> BoxFuture<'_, Option<String>, Self::Error> {
        let text = text.to_string();
        let slot_kind = slot_kind.to_string();
        Box::pin(async move {
            let mut req = self.client.post(&self.endpoint_url).json(&ExtractRequest {
                text: &text,
                slot_kind: &slot_kind,
                context,
            });
            if let Some(api_key) = &self.api_key {
                req = req.bearer_auth(api_key);
            }

            let response = req
                .send()
                .await
                .map_err(|e| BoxedError(Box::new(NlpError::Http(e))))?;

            if !response.status().is_success() {
                tracing::warn!(status = %response.status(), "NLP interpreter returned non-success status");
                return Ok(None);
            }

            let parsed: ExtractResponse = response
                .json()
                .await
                .map_err(|e| BoxedError(Box::new(NlpError::Http(e))))?;

            Ok(match parsed.value {
                Some(v) if !v.trim().is_empty() && v.trim() != NO_UNDERSTAND_SENTINEL => {
                    Some(v.trim().to_string())
                }
                _ => None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_understand_sentinel_maps_to_none() {
        let parsed = ExtractResponse {
            value: Some(NO_UNDERSTAND_SENTINEL.to_string()),
        };
        let mapped = match parsed.value {
            Some(v) if !v.trim().is_empty() && v.trim() != NO_UNDERSTAND_SENTINEL => Some(v),
            _ => None,
        };
        assert_eq!(mapped, None);
    }

    #[test]
    fn empty_value_maps_to_none() {
        let parsed = ExtractResponse {
            value: Some("   ".to_string()),
        };
        let mapped = match parsed.value {
            Some(v) if !v.trim().is_empty() && v.trim() != NO_UNDERSTAND_SENTINEL => Some(v),
            _ => None,
        };
        assert_eq!(mapped, None);
    }

    #[test]
    fn real_value_passes_through_trimmed() {
        let parsed = ExtractResponse {
            value: Some(" reservar ".to_string()),
        };
        let mapped = match parsed.value {
            Some(v) if !v.trim().is_empty() && v.trim() != NO_UNDERSTAND_SENTINEL => {
                Some(v.trim().to_string())
            }
            _ => None,
        };
        assert_eq!(mapped, Some("reservar".to_string()));
    }
}
