//! Natural-language slot interpreter for the booking engine.
//!
//! A pure function over (text, slot_kind, shop context) → extracted value
//! or "did not understand", fronted by an HTTP call to the configured
//! interpreter endpoint. The interpreter's own logic is external; this
//! crate owns only the request/response contract and dialogue-facing
//! `NlpService` adapter.

pub mod client;
pub mod error;

pub use client::HttpNlpInterpreter;
pub use error::NlpError;
