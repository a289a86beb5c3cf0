//! WhatsApp Business Cloud API adapter.
//!
//! Owns the wire format: parsing inbound webhook envelopes into
//! [`envelope::CanonicalMessage`]s, verifying the `X-Hub-Signature-256`
//! header, and sending outbound text/menu messages. Rate limiting, dedupe,
//! and the worker pool that actually drives the webhook HTTP routes live
//! in the dispatcher crate — this one has no HTTP surface of its own.

pub mod envelope;
pub mod error;
pub mod outbound;

pub use envelope::{
    extract_messages, idempotency_key, normalize_session_id, session_id_for_msisdn,
    verify_signature, verify_subscription, CanonicalMessage, MessageOrigin,
};
pub use error::MessagingError;
pub use outbound::WhatsAppMessagingService;
