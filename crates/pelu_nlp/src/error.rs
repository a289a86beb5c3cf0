use thiserror::Error;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("HTTP error calling NLP interpreter: {0}")]
    Http(#[from] reqwest::Error),
    #[error("NLP interpreter returned an unparseable response")]
    InvalidResponse,
}
