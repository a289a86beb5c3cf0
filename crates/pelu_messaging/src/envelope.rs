//! WhatsApp Business Cloud API webhook envelope: parsing, signature
//! verification, and the session/idempotency key derivations shared by the
//! webhook dispatcher and the dialogue engine.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::MessagingError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct Envelope {
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct Value {
    metadata: Metadata,
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    from: String,
    id: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
    text: Option<TextBody>,
    interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
struct Interactive {
    #[serde(rename = "type")]
    kind: String,
    button_reply: Option<IdPayload>,
    list_reply: Option<IdPayload>,
}

#[derive(Debug, Deserialize)]
struct IdPayload {
    id: String,
}

/// Where a message's text came from — a free-text reply, a button tap, or a
/// list selection. The dialogue engine treats all three as a plain string,
/// but the webhook dispatcher needs to know `List` to run its
/// pagination/index-translation step first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Text,
    Button,
    List,
}

/// A single inbound user message, reduced to what the dialogue engine and
/// dedupe filters need. One webhook POST can carry several of these.
#[derive(Debug, Clone)]
pub struct CanonicalMessage {
    pub phone_number_id: String,
    pub session_id: String,
    pub message_id: String,
    pub timestamp: i64,
    pub origin: MessageOrigin,
    pub payload: String,
}

/// Derives the session id the dialogue engine keys state on. Matches the
/// upstream `wa_<msisdn>` convention.
pub fn session_id_for_msisdn(msisdn: &str) -> String {
    format!("wa_{}", msisdn)
}

/// Falls back to `"wa_unknown"` when neither an explicit session id nor a
/// msisdn is available — defensive normalisation for callers that can't
/// guarantee a msisdn (e.g. a malformed envelope).
pub fn normalize_session_id(session_id: Option<&str>, msisdn: &str) -> String {
    match session_id {
        Some(sid) if !sid.is_empty() => sid.to_string(),
        _ if !msisdn.is_empty() => session_id_for_msisdn(msisdn),
        _ => "wa_unknown".to_string(),
    }
}

/// Parses a raw webhook POST body into the messages it carries. A single
/// envelope can legitimately contain zero messages (status callbacks) —
/// callers should treat an empty result as a no-op, not an error.
pub fn extract_messages(body: &[u8]) -> Result<Vec<CanonicalMessage>, MessagingError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| MessagingError::InvalidEnvelope(e.to_string()))?;

    let mut out = Vec::new();
    for entry in envelope.entry {
        for change in entry.changes {
            let phone_number_id = change.value.metadata.phone_number_id.clone();
            for msg in change.value.messages {
                let timestamp: i64 = msg.timestamp.parse().map_err(|_| {
                    MessagingError::InvalidEnvelope(format!(
                        "non-numeric timestamp {:?}",
                        msg.timestamp
                    ))
                })?;
                let session_id = session_id_for_msisdn(&msg.from);

                let (origin, payload) = match msg.kind.as_str() {
                    "text" => (
                        MessageOrigin::Text,
                        msg.text.map(|t| t.body).unwrap_or_default(),
                    ),
                    "interactive" => {
                        let interactive = match msg.interactive {
                            Some(i) => i,
                            None => continue,
                        };
                        match interactive.kind.as_str() {
                            "button_reply" => {
                                let id = interactive.button_reply.map(|b| b.id);
                                (MessageOrigin::Button, id.unwrap_or_default())
                            }
                            "list_reply" => {
                                let id = interactive.list_reply.map(|l| l.id);
                                (MessageOrigin::List, id.unwrap_or_default())
                            }
                            _ => continue,
                        }
                    }
                    _ => continue,
                };

                out.push(CanonicalMessage {
                    phone_number_id: phone_number_id.clone(),
                    session_id,
                    message_id: msg.id,
                    timestamp,
                    origin,
                    payload,
                });
            }
        }
    }
    Ok(out)
}

/// Verifies the `X-Hub-Signature-256` header against the raw request body.
/// Missing header, wrong prefix, or a bad hex digest are all just "not
/// valid" — this never panics or errors on malformed input.
pub fn verify_signature(app_secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Handles the subscription-verification GET handshake: returns the
/// challenge string to echo back on a match, `None` otherwise.
pub fn verify_subscription(
    mode: &str,
    token: &str,
    challenge: &str,
    expected_token: &str,
) -> Option<String> {
    if mode == "subscribe" && token == expected_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Recursively sorts object keys so two JSON values that differ only in key
/// order serialize identically — the idempotency key must not depend on
/// how the caller happened to construct the payload map.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Deterministic idempotency key for an outbound send: a hash of the
/// session id and the payload, independent of the payload's key order.
pub fn idempotency_key(session_id: &str, payload: &serde_json::Value) -> String {
    let canonical = canonicalize(payload).to_string();
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verify_signature_accepts_matching_digest() {
        let secret = "abc123";
        let body = br#"{"hello":"world"}"#;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let digest = hex::encode(mac.finalize().into_bytes());
        let header = format!("sha256={}", digest);
        assert!(verify_signature(secret, body, &header));
    }

    #[test]
    fn verify_signature_rejects_wrong_digest() {
        assert!(!verify_signature("abc", b"x", "sha256=00"));
    }

    #[test]
    fn verify_signature_rejects_missing_header() {
        assert!(!verify_signature("abc", b"x", ""));
    }

    #[test]
    fn verify_signature_rejects_wrong_prefix() {
        assert!(!verify_signature("abc", b"x", "sha1=000"));
    }

    #[test]
    fn normalize_session_id_prefers_explicit_value() {
        assert_eq!(normalize_session_id(None, "600000000"), "wa_600000000");
        assert_eq!(
            normalize_session_id(Some("wa_abc"), "600000000"),
            "wa_abc"
        );
        assert_eq!(normalize_session_id(None, ""), "wa_unknown");
    }

    #[test]
    fn idempotency_key_is_independent_of_key_order() {
        let p1 = json!({"a": 1, "b": 2});
        let p2 = json!({"b": 2, "a": 1});
        assert_eq!(idempotency_key("wa_600", &p1), idempotency_key("wa_600", &p2));
    }

    #[test]
    fn extract_messages_parses_text_message() {
        let body = br#"{"entry":[{"changes":[{"value":{
            "metadata":{"phone_number_id":"PH_1"},
            "messages":[{"from":"600000000","id":"wamid-1","timestamp":"1695031200","type":"text","text":{"body":"reservar"}}]
        }}]}]}"#;
        let messages = extract_messages(body).unwrap();
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.session_id, "wa_600000000");
        assert_eq!(m.message_id, "wamid-1");
        assert_eq!(m.timestamp, 1695031200);
        assert_eq!(m.origin, MessageOrigin::Text);
        assert_eq!(m.payload, "reservar");
    }

    #[test]
    fn extract_messages_parses_list_reply() {
        let body = br#"{"entry":[{"changes":[{"value":{
            "metadata":{"phone_number_id":"PH_1"},
            "messages":[{"from":"600","id":"w2","timestamp":"1695031200","type":"interactive",
                "interactive":{"type":"list_reply","list_reply":{"id":"HORA_P1_0"}}}]
        }}]}]}"#;
        let messages = extract_messages(body).unwrap();
        assert_eq!(messages[0].origin, MessageOrigin::List);
        assert_eq!(messages[0].payload, "HORA_P1_0");
    }

    #[test]
    fn verify_subscription_matches_token() {
        assert_eq!(
            verify_subscription("subscribe", "t", "42", "t"),
            Some("42".to_string())
        );
        assert_eq!(verify_subscription("subscribe", "wrong", "42", "t"), None);
    }
}
