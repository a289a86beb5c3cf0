use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("HTTP error calling WhatsApp Cloud API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no outbound token configured for phone_number_id {0}")]
    UnknownPhoneNumberId(String),
    #[error("WhatsApp Cloud API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("malformed webhook envelope: {0}")]
    InvalidEnvelope(String),
}
